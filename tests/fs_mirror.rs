// tests/fs_mirror.rs

mod common;

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use common::{write_file, TestResult};
use devwatch::errors::FsErrorKind;
use devwatch::fs::mock::MockFileSystem;
use devwatch::fs::{reconcile_tree, sync_path, FileSystem, RealFileSystem, SyncAction};
use devwatch::watch::GlobSpec;

fn globs() -> GlobSpec {
    GlobSpec::new(&["public/**/*".to_string()], &["**/*.ts".to_string()]).unwrap()
}

#[test]
fn real_copy_preserves_modification_time() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let src = tmp.path().join("src");
    let out = tmp.path().join("lib");
    write_file(&src, "public/site.css", "body {}");

    let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
    fs::File::options()
        .write(true)
        .open(src.join("public/site.css"))?
        .set_modified(old)?;

    let action = sync_path(&RealFileSystem, &src, &out, "public/site.css")?;
    assert_eq!(action, SyncAction::Copied);
    assert_eq!(fs::metadata(out.join("public/site.css"))?.modified()?, old);

    // Same size and mtime: nothing to do.
    let action = sync_path(&RealFileSystem, &src, &out, "public/site.css")?;
    assert_eq!(action, SyncAction::Unchanged);
    Ok(())
}

#[test]
fn real_delete_then_missing_is_already_absent() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let src = tmp.path().join("src");
    let out = tmp.path().join("lib");
    write_file(&src, "public/a.js", "1");
    reconcile_tree(&RealFileSystem, &src, &out, &globs())?;

    fs::remove_file(src.join("public/a.js"))?;
    assert_eq!(sync_path(&RealFileSystem, &src, &out, "public/a.js")?, SyncAction::Removed);
    assert_eq!(
        sync_path(&RealFileSystem, &src, &out, "public/a.js")?,
        SyncAction::AlreadyAbsent
    );
    Ok(())
}

#[test]
fn file_in_the_way_of_an_output_directory_is_an_error() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let src = tmp.path().join("src");
    let out = tmp.path().join("lib");
    write_file(&src, "public/img/logo.svg", "<svg/>");
    write_file(&out, "public/img", "not a directory");

    let err = sync_path(&RealFileSystem, &src, &out, "public/img/logo.svg").unwrap_err();
    assert!(matches!(
        err.kind,
        FsErrorKind::AlreadyExists | FsErrorKind::NotADirectory
    ));
    Ok(())
}

#[test]
fn mock_reconcile_skips_excluded_and_unchanged_files() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_dir("/p/src");
    fs.add_dir("/p/src/public");
    fs.add_dir("/p/lib");
    fs.add_file("/p/src/public/a.js", "a", 10);
    fs.add_file("/p/src/public/b.ts", "b", 10);
    fs.add_file("/p/src/index.js", "i", 10);

    let stats = reconcile_tree(&fs, Path::new("/p/src"), Path::new("/p/lib"), &globs())?;
    assert_eq!((stats.matched, stats.copied), (1, 1));
    assert_eq!(fs.contents("/p/lib/public/a.js").as_deref(), Some(&b"a"[..]));
    assert!(fs.contents("/p/lib/public/b.ts").is_none());

    let writes = fs.write_count();
    fs.add_file("/p/src/public/a.js", "A", 20);
    let stats = reconcile_tree(&fs, Path::new("/p/src"), Path::new("/p/lib"), &globs())?;
    assert_eq!(stats.copied, 1);
    assert_eq!(fs.write_count(), writes + 1);
    assert!(fs.stat(Path::new("/p/lib/public/a.js"))?.is_file());
    Ok(())
}
