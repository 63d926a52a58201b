use assert_cmd::Command;
use filetime::FileTime;
use predicates::str::contains;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

// Helper function to get the path to the compiled binary
fn paracoder_cmd() -> Command {
    let mut cmd = Command::cargo_bin("paracoder").expect("Failed to find paracoder binary");
    cmd.env_remove("PARACODER_CONFIG").env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_help_lists_options() -> Result<(), Box<dyn Error>> {
    paracoder_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("--recurse"))
        .stdout(contains("--delete-to-trash"))
        .stdout(contains("--preserve-file-timestamp"));
    Ok(())
}

#[test]
fn test_no_input_is_a_usage_error() -> Result<(), Box<dyn Error>> {
    paracoder_cmd().assert().code(2);
    Ok(())
}

#[test]
fn test_invalid_argument() -> Result<(), Box<dyn Error>> {
    paracoder_cmd()
        .arg("--no-such-flag")
        .assert()
        .failure()
        .stderr(contains("unexpected argument"));
    Ok(())
}

#[test]
fn test_non_existent_input() -> Result<(), Box<dyn Error>> {
    let missing = PathBuf::from("surely/this/does/not/exist/album");
    paracoder_cmd().arg(&missing).assert().code(1);
    Ok(())
}

#[test]
fn test_missing_config_file() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("a.flac"), b"a")?;

    paracoder_cmd()
        .arg("--config")
        .arg(dir.path().join("missing.toml"))
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(contains("missing.toml"));

    dir.close()?;
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_config_driven_batch() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let music = dir.path().join("music");
    fs::create_dir_all(music.join("disc2"))?;
    fs::write(music.join("one.flac"), b"one")?;
    fs::write(music.join("disc2").join("two.wav"), b"two")?;
    fs::write(music.join("cover.jpg"), b"jpg")?;

    let source_time = FileTime::from_unix_time(1_500_000_000, 0);
    filetime::set_file_mtime(music.join("one.flac"), source_time)?;

    let config = dir.path().join("commands.toml");
    fs::write(
        &config,
        r#"file_extensions = ["flac", "wav"]

[command_template]
any = 'cp "{{F}}" "{{D}}{{P}}{{N}}.copy"'
"#,
    )?;

    paracoder_cmd()
        .arg("--config")
        .arg(&config)
        .arg("--recurse")
        .arg("--thread-count")
        .arg("2")
        .arg(&music)
        .assert()
        .success()
        .stdout(contains("Max exit code: 0"));

    assert!(music.join("one.copy").exists());
    assert!(music.join("disc2").join("two.copy").exists());
    assert!(!music.join("cover.copy").exists());
    let copied = FileTime::from_last_modification_time(&fs::metadata(music.join("one.copy"))?);
    assert_eq!(copied, source_time);

    dir.close()?;
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_config_from_environment_and_failing_unit() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("a.flac"), b"a")?;

    let config = dir.path().join("commands.toml");
    fs::write(
        &config,
        "file_extensions = [\"flac\"]\n[command_template]\nflac = 'sh -c \"exit 4\" \"{{F}}.out\"'\n",
    )?;

    paracoder_cmd()
        .env("PARACODER_CONFIG", &config)
        .arg(dir.path().join("a.flac"))
        .assert()
        .code(4)
        .stdout(contains("Max exit code: 4"));

    dir.close()?;
    Ok(())
}
