//! Interactive shell over a single-image virtual filesystem backed by a regular host file.

use log::info;
use std::env;
use std::io;
use std::io::BufRead;
use std::io::IsTerminal;
use std::io::Write;
use std::path::PathBuf;
use std::process::exit;
use vfscore::DirEntryKind;
use vfscore::Filesystem;
use vfscore::FsError;
use vfsutil::prompt::prompt;
use vfsutil::util::ByteSize;

const MAX_ARG_LEN: usize = 511;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
	/// The name of the current program, used in diagnostics.
	prog: String,
	/// If true, print command line help and exit.
	help: bool,
	/// The path to the virtual disk image.
	disk_path: Option<PathBuf>,
}

fn parse_args() -> Args {
	let mut args: Args = Default::default();
	let mut iter = env::args();

	args.prog = iter.next().unwrap_or_else(|| "vfsh".to_owned());

	for arg in iter {
		match arg.as_str() {
			"-h" | "--help" => args.help = true,
			_ => args.disk_path = Some(PathBuf::from(arg)),
		}
	}

	args
}

fn print_usage(prog: &str) {
	println!("Usage: {prog} <disk-path>");
	println!();
	println!("Opens (or creates) a virtual disk image and starts an interactive shell.");
	println!("  -h, --help  print this help and exit");
}

/// Reads lines from stdin until one is non-blank and does not start with `#`.
fn read_meaningful_line(prompt_text: &str) -> Option<String> {
	loop {
		let line = prompt(Some(prompt_text))?;
		let trimmed = line.trim();
		if trimmed.is_empty() || trimmed.starts_with('#') {
			continue;
		}
		return Some(trimmed.to_string());
	}
}

/// Runs the create-on-missing startup protocol: if `disk_path` doesn't exist, asks for
/// confirmation and a size, then formats it.
fn open_or_create(disk_path: &std::path::Path, prog: &str) -> Filesystem {
	if disk_path.exists() {
		return Filesystem::mount(disk_path).unwrap_or_else(|e| {
			eprintln!("{prog}: {}: {e}", disk_path.display());
			exit(1);
		});
	}

	let confirm = read_meaningful_line(&format!(
		"{} does not exist, create it? (y/n) ",
		disk_path.display()
	))
	.unwrap_or_else(|| {
		eprintln!("{prog}: no input, aborting");
		exit(0);
	});
	if confirm.to_lowercase() != "y" {
		eprintln!("{prog}: abort");
		exit(0);
	}

	let size_line = read_meaningful_line("size in bytes: ").unwrap_or_else(|| {
		eprintln!("{prog}: no input, aborting");
		exit(0);
	});
	let size_bytes: u64 = size_line.parse().unwrap_or_else(|_| {
		eprintln!("{prog}: invalid size `{size_line}`");
		exit(1);
	});
	if size_bytes == 0 {
		eprintln!("{prog}: invalid size `{size_line}`");
		exit(1);
	}

	Filesystem::mkfs(disk_path, size_bytes).unwrap_or_else(|e| {
		eprintln!("{prog}: {}: {e}", disk_path.display());
		exit(1);
	})
}

fn print_help() {
	println!("ls [path]              list a directory or describe a file (default .)");
	println!("cd [path]              change the working directory (default /)");
	println!("pwd                    print the working directory");
	println!("mkdir <path>           create a directory");
	println!("rmdir <path>           remove an empty directory");
	println!("rm <path>              remove a file");
	println!("ln <target> <link>     hard-link a file");
	println!("cp-to <host> <vdisk>   import a host file");
	println!("cp-from <vdisk> <host> export to a host file");
	println!("append <path> <n>     grow a file by n zero bytes");
	println!("truncate <path> <n>    shrink a file by n bytes");
	println!("df                     report disk usage");
	println!("help                   print this text");
	println!("exit, quit             leave the shell");
}

fn render_fs_error(e: &FsError) {
	eprintln!("error: {e}");
}

/// Dispatches one parsed command line. Returns `false` if the shell should exit.
fn dispatch(fs: &mut Filesystem, command: &str, argv: &[&str]) -> bool {
	if argv.iter().any(|a| a.len() > MAX_ARG_LEN) {
		render_fs_error(&FsError::InvalidArgument("argument too long".to_string()));
		return true;
	}

	let result = match (command, argv) {
		("ls", []) => run_ls(fs, "."),
		("ls", [path]) => run_ls(fs, path),
		("cd", []) => fs.cd("/"),
		("cd", [path]) => fs.cd(path),
		("pwd", []) => fs.pwd().map(|p| println!("{p}")),
		("mkdir", [path]) => fs.mkdir(path),
		("rmdir", [path]) => fs.rmdir(path),
		("rm", [path]) => fs.rm(path),
		("ln", [target, link]) => fs.ln(target, link),
		("cp-to", [host, vdisk]) => fs.cp_in(std::path::Path::new(host), vdisk),
		("cp-from", [vdisk, host]) => fs.cp_out(vdisk, std::path::Path::new(host)),
		("append", [path, n]) => run_append(fs, path, n),
		("truncate", [path, n]) => run_truncate(fs, path, n),
		("df", []) => {
			run_df(fs);
			Ok(())
		}
		("help", []) => {
			print_help();
			Ok(())
		}
		("exit" | "quit", []) => return false,
		_ => {
			eprintln!("{command}: invalid usage, see `help`");
			return true;
		}
	};

	if let Err(e) = result {
		render_fs_error(&e);
		if e.is_fatal() {
			exit(1);
		}
	}

	true
}

fn run_ls(fs: &mut Filesystem, path: &str) -> Result<(), FsError> {
	match fs.ls(path)? {
		vfscore::Listing::Directory(mut entries) => {
			entries.sort_by(|a, b| a.0.cmp(&b.0));
			for (name, kind) in entries {
				let tag = match kind {
					DirEntryKind::Directory => 'd',
					DirEntryKind::File => 'f',
				};
				println!("{tag} {name}");
			}
		}
		vfscore::Listing::File(stat) => {
			println!("f {} ({} bytes)", path, stat.size);
		}
	}
	Ok(())
}

fn run_append(fs: &mut Filesystem, path: &str, n: &str) -> Result<(), FsError> {
	let n: u64 = n
		.parse()
		.map_err(|_| FsError::InvalidArgument(format!("`{n}` is not a byte count")))?;
	let added = fs.append(path, n)?;
	if added < n {
		println!("appended {added} of {n} requested bytes (disk full)");
	}
	Ok(())
}

fn run_truncate(fs: &mut Filesystem, path: &str, n: &str) -> Result<(), FsError> {
	let n: u64 = n
		.parse()
		.map_err(|_| FsError::InvalidArgument(format!("`{n}` is not a byte count")))?;
	fs.truncate(path, n)
}

fn run_df(fs: &Filesystem) {
	let usage = fs.df();
	println!(
		"inodes: {}/{} used, blocks: {}/{} used, {} / {} used",
		usage.inodes_used,
		usage.inodes_total,
		usage.blocks_used,
		usage.blocks_total,
		ByteSize(usage.bytes_used),
		ByteSize(usage.bytes_total),
	);
}

fn main() {
	env_logger::init();
	let args = parse_args();

	if args.help {
		print_usage(&args.prog);
		return;
	}

	let disk_path = args.disk_path.unwrap_or_else(|| {
		eprintln!("{}: specify path to a disk image", args.prog);
		print_usage(&args.prog);
		exit(1);
	});

	let mut fs = open_or_create(&disk_path, &args.prog);
	info!("filesystem ready at {}", disk_path.display());

	let stdin = io::stdin();
	let interactive = stdin.is_terminal();
	loop {
		if interactive {
			print!("> ");
			let _ = io::stdout().flush();
		}

		let mut line = String::new();
		match stdin.lock().read_line(&mut line) {
			Ok(0) => break,
			Ok(_) => {}
			Err(e) => {
				eprintln!("{}: {e}", args.prog);
				break;
			}
		}

		let line = line.trim();
		if line.is_empty() || line.starts_with('#') {
			continue;
		}

		let mut tokens = line.split_whitespace();
		let Some(command) = tokens.next() else { continue };
		let argv: Vec<&str> = tokens.collect();

		if !dispatch(&mut fs, command, &argv) {
			break;
		}
	}
}
