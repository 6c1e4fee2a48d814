use std::{cell::RefCell, fs, io, rc::Rc};

use pkg_datastream::{Archiver, ArchiverMode, ArchiverOutput, Device};

/// Archiver for the volumes built by [`DataStream`](super::media::DataStream).
///
/// Every archive is a single block. Extracted parts are written as
/// `<package>.<index>`, and the metadata archive as `META`, with the
/// requested patterns.
///
/// When the device has no more blocks, the archiver fails.
#[derive(Clone, Default)]
pub struct FakeArchiver {
    pub log: Rc<RefCell<Vec<String>>>,
}

impl FakeArchiver {
    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }
}

impl Archiver for FakeArchiver {
    fn run(
        &mut self,
        device: &mut Device,
        mode: ArchiverMode<'_>,
        block_size: usize,
    ) -> io::Result<ArchiverOutput> {
        let operation = match mode {
            ArchiverMode::Extract { .. } => "extract",
            ArchiverMode::Skip => "skip",
        };

        let mut block = vec![0; block_size];
        if !device.read_block(&mut block)? {
            self.log.borrow_mut().push(format!("{operation} <eof>"));

            return Ok(ArchiverOutput {
                command: operation.to_owned(),
                status: Some(1),
                diagnostics: "premature end of archive".to_owned(),
            });
        }

        let text = String::from_utf8_lossy(&block)
            .trim_end_matches('\0')
            .to_owned();

        self.log.borrow_mut().push(format!("{operation} {text}"));

        if let ArchiverMode::Extract { target, patterns } = mode {
            match text.split_whitespace().collect::<Vec<_>>()[..] {
                ["META"] => fs::write(target.join("META"), patterns.join("\n"))?,
                ["PART", package, index] => {
                    fs::write(target.join(format!("{package}.{index}")), &text)?
                }
                _ => panic!("Invalid archive: {text:?}"),
            }
        }

        Ok(ArchiverOutput {
            command: operation.to_owned(),
            status: Some(0),
            diagnostics: String::new(),
        })
    }
}
