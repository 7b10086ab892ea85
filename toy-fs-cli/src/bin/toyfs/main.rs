mod cli;

use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Command};
use log::info;
use spin::Mutex;
use toy_fs::{Inode, Mode, ToyFileSystem};
use toy_fs_cli::{BlockFile, SystemClock};
use vfs::FileKind;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    if let Command::Format = cli.command {
        let device = Arc::new(BlockFile::create(&cli.image)?);
        let efs = ToyFileSystem::format(device, Arc::new(SystemClock))?;
        efs.lock().unmount()?;
        println!("formatted {:?}", cli.image);
        return Ok(());
    }

    let device = Arc::new(BlockFile::open(&cli.image)?);
    let efs = ToyFileSystem::mount(device, Arc::new(SystemClock))?;
    info!("mounted {:?}", cli.image);
    // 出错也要卸载，镜像才不会留下脏标记
    let result = run(&efs, cli.command);
    efs.lock().unmount()?;
    result
}

fn run(efs: &Arc<Mutex<ToyFileSystem>>, command: Command) -> Result<(), Box<dyn Error>> {
    let root = ToyFileSystem::root_inode(efs)?;

    match command {
        Command::Format => unreachable!("handled before mounting"),
        Command::Info => {
            let statfs = efs.lock().statfs();
            println!("block size:   {}", statfs.block_size);
            println!("blocks:       {} / {} free", statfs.free_blocks, statfs.total_blocks);
            println!("inodes:       {} / {} free", statfs.free_inodes, statfs.total_inodes);
            println!("name max:     {}", statfs.name_max);
        }
        Command::Ls { path } => {
            let dir = resolve(&root, &path)?;
            for entry in dir.read_dir()? {
                let inode = ToyFileSystem::read_inode(efs, entry.ino)?;
                let stat = inode.stat()?;
                let kind = match stat.kind {
                    FileKind::Regular => '-',
                    FileKind::Directory => 'd',
                    FileKind::Symlink => 'l',
                };
                print!(
                    "{kind} {:>3o} {:>2} {:>6} {:>3} {}",
                    stat.permissions.bits(),
                    stat.links,
                    stat.size,
                    stat.ino,
                    entry.name
                );
                if stat.kind == FileKind::Symlink {
                    print!(" -> {}", inode.read_link()?);
                }
                println!();
            }
        }
        Command::Put { source, dest } => {
            let data = fs::read(&source)?;
            let (parent, name) = split(&dest);
            let parent = resolve(&root, parent)?;
            let file = match parent.find(name) {
                Ok(file) => {
                    file.truncate(0)?;
                    file
                }
                Err(vfs::Error::NotFound) => parent.create(name, Mode::regular())?,
                Err(e) => return Err(e.into()),
            };
            let written = file.write_at(0, &data)?;
            println!("{source:?} -> {dest}: {written} bytes");
        }
        Command::Cat { path } => {
            let file = resolve(&root, &path)?;
            io::stdout().write_all(&file.read_all()?)?;
        }
        Command::Mkdir { path } => {
            let (parent, name) = split(&path);
            resolve(&root, parent)?.mkdir(name)?;
        }
        Command::Symlink { target, path } => {
            let (parent, name) = split(&path);
            resolve(&root, parent)?.symlink(name, &target)?;
        }
        Command::Rm { path } => {
            let (parent, name) = split(&path);
            let parent = resolve(&root, parent)?;
            let kind = parent.find(name)?.stat()?.kind;
            match kind {
                FileKind::Directory => parent.rmdir(name)?,
                _ => parent.unlink(name)?,
            }
        }
        Command::Check => {
            efs.lock().verify()?;
            println!("ok");
        }
    }

    Ok(())
}

/// 从根目录逐级查找，不跟随符号链接
fn resolve(root: &Inode, path: &str) -> vfs::Result<Inode> {
    path.split('/')
        .filter(|name| !name.is_empty())
        .try_fold(root.clone(), |dir, name| dir.find(name))
}

/// 拆出父目录与最后一级名字
fn split(path: &str) -> (&str, &str) {
    let path = path.trim_end_matches('/');
    path.rsplit_once('/').unwrap_or(("", path))
}
