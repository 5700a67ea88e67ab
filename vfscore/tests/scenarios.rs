//! End-to-end scenarios over a fresh 1 MiB disk image.

use vfscore::DirEntryKind;
use vfscore::FsError;
use vfscore::Listing;

fn fresh(dir: &std::path::Path) -> vfscore::Filesystem {
	vfscore::Filesystem::mkfs(&dir.join("disk.img"), 1024 * 1024).unwrap()
}

#[test]
fn nested_mkdir_ls_and_pwd() {
	let dir = tempfile::tempdir().unwrap();
	let mut fs = fresh(dir.path());

	fs.mkdir("/a").unwrap();
	fs.mkdir("/a/b").unwrap();

	match fs.ls("/a").unwrap() {
		Listing::Directory(entries) => assert_eq!(entries, vec![("b".to_string(), DirEntryKind::Directory)]),
		Listing::File(_) => panic!("expected directory listing"),
	}

	fs.cd("/a/b").unwrap();
	assert_eq!(fs.pwd().unwrap(), "/a/b");
}

#[test]
fn import_then_export_round_trips_and_df_counts_one_block() {
	let dir = tempfile::tempdir().unwrap();
	let mut fs = fresh(dir.path());

	let usage_fresh = fs.df();

	let host_in = dir.path().join("hello.txt");
	std::fs::write(&host_in, b"hello").unwrap();
	fs.cp_in(&host_in, "/greet").unwrap();

	let host_out = dir.path().join("out.txt");
	fs.cp_out("/greet", &host_out).unwrap();
	assert_eq!(std::fs::read(&host_out).unwrap(), b"hello");

	let usage_after = fs.df();
	assert_eq!(usage_after.blocks_used, usage_fresh.blocks_used + 1);
}

#[test]
fn hard_link_survives_removal_of_original_name() {
	let dir = tempfile::tempdir().unwrap();
	let mut fs = fresh(dir.path());

	fs.mkdir("/d").unwrap();
	let host_in = dir.path().join("f.bin");
	std::fs::write(&host_in, [1u8]).unwrap();
	fs.cp_in(&host_in, "/d/f").unwrap();
	fs.ln("/d/f", "/d/g").unwrap();

	let stat_f = fs.stat("/d/f").unwrap();
	let stat_g = fs.stat("/d/g").unwrap();
	assert_eq!(stat_f.inode_number, stat_g.inode_number);
	assert_eq!(stat_g.link_count, 2);

	fs.rm("/d/f").unwrap();
	assert!(matches!(fs.stat("/d/f"), Err(FsError::NotFound(_))));

	let stat_g = fs.stat("/d/g").unwrap();
	assert_eq!(stat_g.link_count, 1);

	let host_out = dir.path().join("g.bin");
	fs.cp_out("/d/g", &host_out).unwrap();
	assert_eq!(std::fs::read(&host_out).unwrap(), [1u8]);
}

#[test]
fn truncate_frees_blocks_in_two_steps() {
	let dir = tempfile::tempdir().unwrap();
	let mut fs = fresh(dir.path());

	let host_in = dir.path().join("big.bin");
	std::fs::write(&host_in, vec![1u8; 8192]).unwrap();
	fs.cp_in(&host_in, "/big").unwrap();

	let usage_before = fs.df();
	fs.truncate("/big", 4097).unwrap();
	assert_eq!(fs.stat("/big").unwrap().size, 4095);
	assert_eq!(fs.df().blocks_used, usage_before.blocks_used - 1);

	fs.truncate("/big", 10000).unwrap();
	assert_eq!(fs.stat("/big").unwrap().size, 0);
	assert_eq!(fs.df().blocks_used, usage_before.blocks_used - 2);
}

#[test]
fn rmdir_then_repeat_reports_not_found_and_root_is_refused() {
	let dir = tempfile::tempdir().unwrap();
	let mut fs = fresh(dir.path());

	fs.mkdir("/x").unwrap();
	fs.rmdir("/x").unwrap();
	assert!(matches!(fs.rmdir("/x"), Err(FsError::NotFound(_))));
	assert!(matches!(fs.rmdir("/"), Err(FsError::CannotRemoveRoot)));
}

#[test]
fn mkdir_under_space_pressure_leaves_no_partial_state() {
	let dir = tempfile::tempdir().unwrap();
	let mut fs = fresh(dir.path());

	// Nest one directory per level so the bottleneck is the inode bitmap, not any single
	// directory's entry table.
	loop {
		match fs.mkdir("d") {
			Ok(()) => fs.cd("d").unwrap(),
			Err(FsError::NoSpace) => break,
			Err(e) => panic!("unexpected error: {e}"),
		}
	}

	let usage_before = fs.df();
	assert!(matches!(fs.mkdir("overflow"), Err(FsError::NoSpace)));
	let usage_after = fs.df();
	assert_eq!(usage_before.inodes_used, usage_after.inodes_used);
	assert_eq!(usage_before.blocks_used, usage_after.blocks_used);
	assert!(matches!(fs.stat("overflow"), Err(FsError::NotFound(_))));
}

#[test]
fn file_at_exactly_the_direct_pointer_cap_round_trips() {
	let dir = tempfile::tempdir().unwrap();
	let mut fs = fresh(dir.path());

	let max = vfscore::consts::MAX_FILE_SIZE;
	let host_in = dir.path().join("max.bin");
	std::fs::write(&host_in, vec![9u8; max as usize]).unwrap();
	fs.cp_in(&host_in, "/max").unwrap();
	assert_eq!(fs.stat("/max").unwrap().size as u64, max);

	let too_big_in = dir.path().join("too_big.bin");
	std::fs::write(&too_big_in, vec![9u8; max as usize + 1]).unwrap();
	assert!(matches!(fs.cp_in(&too_big_in, "/toobig"), Err(FsError::FileTooLarge { .. })));
}

#[test]
fn pwd_inverts_cd() {
	let dir = tempfile::tempdir().unwrap();
	let mut fs = fresh(dir.path());

	fs.mkdir("/a").unwrap();
	fs.mkdir("/a/b").unwrap();
	fs.mkdir("/a/b/c").unwrap();
	fs.cd("/a/b/c").unwrap();

	let path = fs.pwd().unwrap();
	fs.cd("/").unwrap();
	fs.cd(&path).unwrap();
	assert_eq!(fs.pwd().unwrap(), path);
}
