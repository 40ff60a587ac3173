use assert_cmd::cargo::cargo_bin_cmd;

#[test]
fn top_level_help_lists_subcommands() {
    let mut cmd = cargo_bin_cmd!("heliowatch");
    let output = cmd.arg("--help").assert().success().get_output().stdout.clone();
    let text = String::from_utf8_lossy(&output);
    for subcommand in ["run", "once", "rebuild", "frames"] {
        assert!(text.contains(subcommand), "help missing '{subcommand}'");
    }
    assert!(text.contains("--config"), "help missing --config");
}

#[test]
fn rebuild_help_mentions_out_dir() {
    let mut cmd = cargo_bin_cmd!("heliowatch");
    let output = cmd
        .arg("rebuild")
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8_lossy(&output);
    assert!(text.contains("--out"), "rebuild help missing --out");
}

#[test]
fn unknown_image_feed_is_rejected() {
    let mut cmd = cargo_bin_cmd!("heliowatch");
    let output = cmd
        .arg("frames")
        .arg("mag_field")
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let text = String::from_utf8_lossy(&output);
    assert!(
        text.contains("unknown image feed 'mag_field'"),
        "unexpected stderr: {text}"
    );
}
