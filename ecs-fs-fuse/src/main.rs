mod block_file;
mod cli;

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use ecs_fs::{FileSystem, BLOCK_SIZE};
use typed_bytesize::ByteSizeIec;

pub use self::{
    block_file::BlockFile,
    cli::{Cli, Command},
};

fn main() -> io::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    log::debug!("image={:?}", cli.image);

    match cli.command {
        Command::Format { blocks } => format(&cli.image, blocks),
        Command::Info => with_fs(&cli.image, |fs| {
            println!("{}", fs.info());
            Ok(())
        }),
        Command::Ls => with_fs(&cli.image, |fs| {
            println!("FS Ls:");
            for entry in fs.ls() {
                println!(
                    "file: {}, size: {}, data_blk: {}",
                    entry.name, entry.size, entry.first_block
                );
            }
            Ok(())
        }),
        Command::Add { host_file, name } => {
            with_fs(&cli.image, |fs| add(fs, &host_file, name.as_deref()))
        }
        Command::Cat { name } => with_fs(&cli.image, |fs| cat(fs, &name)),
        Command::Rm { name } => with_fs(&cli.image, |fs| fs.delete(&name).map_err(fs_error)),
        Command::Stat { name } => with_fs(&cli.image, |fs| {
            let fd = fs.open(&name).map_err(fs_error)?;
            let stat = fs.metadata(fd).map_err(fs_error)?;
            fs.close(fd).map_err(fs_error)?;
            println!(
                "Size of file '{name}' is {} bytes, {} blocks",
                stat.size, stat.blocks
            );
            Ok(())
        }),
    }
}

fn fs_error(e: vfs::Error) -> io::Error {
    io::Error::other(e.to_string())
}

fn format(image: &Path, blocks: usize) -> io::Result<()> {
    let block_file = BlockFile::create(image, blocks)?;
    let fs = FileSystem::format(Arc::new(block_file)).map_err(fs_error)?;
    println!(
        "{image:?}: {blocks} blocks ({}), {} for data",
        ByteSizeIec((blocks * BLOCK_SIZE) as u64),
        fs.info().data_blocks
    );
    fs.unmount().map_err(fs_error)?;

    Ok(())
}

/// Mounts the image for `op`, then unmounts to flush metadata whether `op` failed or not.
fn with_fs(
    image: &Path,
    op: impl FnOnce(&mut FileSystem) -> io::Result<()>,
) -> io::Result<()> {
    let block_file = BlockFile::open(image)?;
    let mut fs = FileSystem::mount(Arc::new(block_file)).map_err(fs_error)?;
    let res = op(&mut fs);
    let unmounted = fs.unmount().map(drop).map_err(fs_error);
    res.and(unmounted)
}

fn add(fs: &mut FileSystem, host_file: &Path, name: Option<&str>) -> io::Result<()> {
    let name = match name {
        Some(name) => name.to_owned(),
        None => host_file
            .file_name()
            .and_then(|fname| fname.to_str())
            .map(str::to_owned)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{host_file:?} has no usable file name"),
                )
            })?,
    };
    let data = fs::read(host_file)?;
    log::info!("add {name:?}: {} bytes", data.len());

    fs.create(&name).map_err(fs_error)?;
    let fd = fs.open(&name).map_err(fs_error)?;
    let mut wrote = 0;
    while wrote < data.len() {
        match fs.write(fd, &data[wrote..]) {
            Ok(n) => wrote += n,
            Err(e) => {
                fs.close(fd).map_err(fs_error)?;
                return Err(io::Error::other(format!(
                    "{name:?}: {e} after {wrote} of {} bytes",
                    data.len()
                )));
            }
        }
    }
    fs.close(fd).map_err(fs_error)
}

fn cat(fs: &mut FileSystem, name: &str) -> io::Result<()> {
    let fd = fs.open(name).map_err(fs_error)?;
    let mut stdout = io::stdout().lock();
    let mut buf = vec![0; BLOCK_SIZE];
    loop {
        let n = fs.read(fd, &mut buf).map_err(fs_error)?;
        if n == 0 {
            break;
        }
        stdout.write_all(&buf[..n])?;
    }
    fs.close(fd).map_err(fs_error)
}
