use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

const TEXT: &str = "the quick brown fox jumps over the lazy dog\n\
                    a lazy dog sleeps in the sun\n\
                    the fox runs away from the dog\n\
                    a quick brown dog jumps over the fox\n";

fn write_corpus(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    for split in ["train.txt", "valid.txt", "test.txt"] {
        fs::write(dir.join(split), TEXT).unwrap();
    }
}

fn init_model(data: &Path, output: &Path) {
    Command::cargo_bin("reinforce-lm")
        .unwrap()
        .arg("init")
        .arg("--data")
        .arg(data)
        .arg("--output")
        .arg(output)
        .args(["--embedding-dim", "8", "--hidden-size", "8", "--layers", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved model"));
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("reinforce-lm").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Policy-gradient fine-tuning for LSTM language models",
        ));
}

#[test]
fn test_cli_train_help_lists_hyperparameters() {
    let mut cmd = Command::cargo_bin("reinforce-lm").unwrap();
    cmd.args(["train", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--sigma"))
        .stdout(predicate::str::contains("--alpha"))
        .stdout(predicate::str::contains("--bptt"))
        .stdout(predicate::str::contains("--init"));
}

#[test]
fn test_cli_init_train_evaluate() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let model = dir.path().join("baseline_model.pt");
    let save_dir = dir.path().join("checkpoints");
    let output = dir.path().join("results").join("log.txt");
    write_corpus(&data);
    init_model(&data, &model);
    assert!(dir.path().join("baseline_model.model.json").exists());

    Command::cargo_bin("reinforce-lm")
        .unwrap()
        .arg("train")
        .arg("--data")
        .arg(&data)
        .arg("--init")
        .arg(&model)
        .arg("--output")
        .arg(&output)
        .arg("--save-dir")
        .arg(&save_dir)
        .args(["--epochs", "2", "--batch-size", "2", "--bptt", "5"])
        .args(["--lr", "0.01", "--report", "2", "--eval-episodes", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Test loss"));

    let record = fs::read_to_string(&output).unwrap();
    assert_eq!(record.lines().count(), 4);
    assert!(record.lines().last().unwrap().starts_with("test\t0.1\t"));
    assert!(save_dir.join("config.json").exists());
    assert!(save_dir.join("results.json").exists());
    assert!(save_dir.join("best.pt").exists());

    Command::cargo_bin("reinforce-lm")
        .unwrap()
        .arg("evaluate")
        .arg("--data")
        .arg(&data)
        .arg("--model")
        .arg(save_dir.join("best.pt"))
        .args(["--batch-size", "2", "--bptt", "5", "--episodes", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Valid loss"))
        .stdout(predicate::str::contains("Greedy reward over 3 episodes"));
}

#[test]
fn test_cli_rejects_non_positive_sigma() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let model = dir.path().join("model.pt");
    write_corpus(&data);
    init_model(&data, &model);

    Command::cargo_bin("reinforce-lm")
        .unwrap()
        .arg("train")
        .arg("--data")
        .arg(&data)
        .arg("--init")
        .arg(&model)
        .arg("--save-dir")
        .arg(dir.path().join("checkpoints"))
        .args(["--sigma", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sigma"));
}

#[test]
fn test_cli_missing_initial_model_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    write_corpus(&data);

    Command::cargo_bin("reinforce-lm")
        .unwrap()
        .arg("train")
        .arg("--data")
        .arg(&data)
        .arg("--init")
        .arg(dir.path().join("missing.pt"))
        .arg("--save-dir")
        .arg(dir.path().join("checkpoints"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load initial model"));
}
