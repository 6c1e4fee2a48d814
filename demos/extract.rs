use std::path::PathBuf;

use clap::Parser;
use pkg_datastream::{Cpio, EventHandler, Session, SystemMedium, VolumeRequest};

#[derive(Parser, Debug)]
struct Args {
    /// Program to extract the archives.
    #[arg(long, default_value = pkg_datastream::CPIO_PROGRAM)]
    cpio: PathBuf,

    /// Device to read if the header is not found in DEVICE.
    #[arg(short, long)]
    fallback: Option<PathBuf>,

    /// Name of the device in the prompts for new volumes.
    #[arg(short, long)]
    alias: Option<String>,

    /// Device with the datastream.
    device: PathBuf,

    /// Target directory. Each package is extracted in a subdirectory.
    target: PathBuf,

    /// Packages to extract. All packages if empty.
    packages: Vec<String>,
}

struct Logger;

impl EventHandler for Logger {
    fn package_located(&self, name: &str, parts: u32, volume: u32) {
        println!("{name}: {parts} parts, from volume {volume}");
    }

    fn part_extracted(&self, name: &str, index: u32, parts: u32) {
        println!("{name}: part {index} of {parts}");
    }

    fn volume_requested(&self, request: &VolumeRequest<'_>) {
        println!("{request}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut builder = Session::builder()
        .archiver(Cpio::new(&args.cpio))
        .medium(SystemMedium::interactive())
        .metadata_dir(&args.target)
        .event_handler(Logger);

    if let Some(alias) = &args.alias {
        builder = builder.alias(alias);
    }

    let mut session = builder.build();

    let requested: Vec<&str> = args.packages.iter().map(String::as_str).collect();
    session.init(&args.device, &requested, args.fallback.as_deref())?;

    let mut packages = match requested.is_empty() {
        true => session.entries().iter().map(|e| e.name().to_owned()).collect(),
        false => args.packages.clone(),
    };

    session.order_packages(&mut packages);

    for name in &packages {
        let parts = session.find_package(&args.device, name)?;

        let dest = args.target.join(name).join("reloc");
        std::fs::create_dir_all(&dest)?;

        for index in 1..=parts {
            session.get_part(index, &dest)?;
        }

        session.skip_to_end()?;
    }

    session.close(true);

    Ok(())
}
