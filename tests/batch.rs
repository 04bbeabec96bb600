#![cfg(unix)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use classgrade::{
    config::StudentRange,
    error::{CONFIG_EXIT_STATUS, NO_MATCH_EXIT_STATUS, exit_status_for},
    grade::{GradeOptions, grade, load_roster},
    report::{Summary, Transcript},
};
use uuid::Uuid;

/// Harness run through `sh`: slow or failing depending on what `q1.py` holds.
const HARNESS: &str = "\
echo \"harness $1\" >&2
if grep -q SLOW q1.py; then echo 'test_slow_start ok' >&2; sleep 5; fi
if grep -q BROKEN q1.py; then echo '*** Failed: f' >&2; exit 1; fi
exit 0
";

const TWO_FILE_INI: &str = "\
[DEFAULT]
select = hw1
interpreter = sh
timeout = 1

[hw1]
glob = *_q1.py, *_q2.py
canon = q1.py, q2.py
dir = hw1
test = test_hw.sh
units = f
";

fn temp_root(ini: &str, submissions: &[(&str, &str)]) -> PathBuf {
    let root = std::env::temp_dir().join(format!("classgrade-batch-{}", Uuid::new_v4()));
    fs::create_dir_all(root.join("hw1")).expect("create grading dir");
    fs::create_dir_all(root.join("submissions")).expect("create submissions dir");
    fs::write(root.join("hw1/test_hw.sh"), HARNESS).expect("write harness");
    fs::write(root.join("grader.ini"), ini).expect("write settings");
    for (name, body) in submissions {
        fs::write(root.join("submissions").join(name), body).expect("write submission");
    }
    root
}

fn class_of_four() -> PathBuf {
    temp_root(
        TWO_FILE_INI,
        &[
            ("ann_1_q1.py", "def f():\n    return 1\n"),
            ("ann_1_q2.py", "def f():\n    return 2\n"),
            ("bob_2_q1.py", "# SLOW\ndef f():\n    pass\n"),
            ("bob_2_q2.py", "def f():\n    pass\n"),
            ("cat_3_q1.py", "def f():\n    pass\n"),
            ("dan_4_q1.py", "# BROKEN\ndef f():\n    pass\n"),
            ("dan_4_q2.py", "def g():\n    pass\n"),
        ],
    )
}

async fn run_batch(root: &Path, options: &GradeOptions) -> (anyhow::Result<Summary>, String) {
    colored::control::set_override(false);
    let mut transcript = Transcript::new(Vec::new());
    let result = grade(&root.join("grader.ini"), options, &mut transcript).await;
    let text = String::from_utf8(transcript.into_inner()).expect("utf-8 transcript");
    (result, text)
}

#[tokio::test]
async fn grades_complete_students_and_survives_a_timeout() {
    let root = class_of_four();
    let (summary, text) = run_batch(&root, &GradeOptions::default()).await;
    let summary = summary.expect("batch should finish");

    assert_eq!(summary.problem, "hw1");
    assert_eq!(summary.graded, 2);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.interrupted, 1);
    assert_eq!(summary.incomplete, 1);
    assert_eq!(summary.unresolved, 0);
    assert_eq!(summary.excerpts_missing, 1);

    assert!(text.contains("*** INCOMPLETE SUBMISSION cat: missing q2.py"));
    assert!(text.contains(
        "Interrupted: Timed out after 1s\nStderr: harness -v\ntest_slow_start ok\n"
    ));
    assert!(text.contains("Return code: 0"));
    assert!(text.contains("Return code: 1"));
    assert!(text.contains("*** Failed: f"));
    assert!(text.contains("harness -v"));
    assert!(text.contains("*** DID NOT FIND EXCERPT *** (f in dan_4_q2.py)"));

    let ann = text.find("ann => ").expect("ann section");
    let bob_end = text.find("=== End of bob ===").expect("bob end marker");
    let dan = text.find("dan => ").expect("dan section");
    assert!(ann < bob_end && bob_end < dan);
    assert!(!text.contains("cat => "));

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn range_override_narrows_the_batch() {
    let root = class_of_four();
    let options = GradeOptions::builder()
        .range(StudentRange {
            from: "d".into(),
            to:   "d".into(),
        })
        .build();
    let (summary, text) = run_batch(&root, &options).await;
    let summary = summary.expect("batch should finish");

    assert_eq!(summary.graded, 1);
    assert_eq!(summary.passed, 0);
    assert!(text.contains("dan => "));
    assert!(!text.contains("ann => "));
    assert!(!text.contains("INCOMPLETE"));

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn range_that_excludes_everyone_is_a_no_match() {
    let root = class_of_four();
    let options = GradeOptions::builder()
        .range(StudentRange {
            from: "x".into(),
            to:   "y".into(),
        })
        .build();
    let (result, _) = run_batch(&root, &options).await;
    let err = result.unwrap_err();

    assert_eq!(exit_status_for(&err), NO_MATCH_EXIT_STATUS);
    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn missing_units_entry_is_a_config_error() {
    let ini = TWO_FILE_INI.replace("units = f\n", "");
    let root = temp_root(&ini, &[("ann_1_q1.py", "def f(): pass\n")]);
    let (result, _) = run_batch(&root, &GradeOptions::default()).await;
    let err = result.unwrap_err();

    assert_eq!(exit_status_for(&err), CONFIG_EXIT_STATUS);
    assert!(format!("{err:#}").contains("Missing entry 'units' in section [hw1]"));
    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn pattern_without_files_is_a_no_match() {
    let root = temp_root(TWO_FILE_INI, &[("ann_1_q1.py", "def f(): pass\n")]);
    let (result, _) = run_batch(&root, &GradeOptions::default()).await;
    let err = result.unwrap_err();

    assert_eq!(exit_status_for(&err), NO_MATCH_EXIT_STATUS);
    assert!(err.to_string().contains("*_q2.py"));
    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn roster_names_replace_file_prefixes() {
    let ini = "\
[DEFAULT]
select = hw2
interpreter = sh
roster = roster.csv

[hw2]
glob = *_q1.py
canon = q1.py
dir = hw1
test = test_hw.sh
units = f
";
    let root = temp_root(
        ini,
        &[
            ("bakerrozellcharles_7_q1.py", "def f():\n    pass\n"),
            ("stranger_8_q1.py", "def f():\n    pass\n"),
        ],
    );
    fs::write(
        root.join("roster.csv"),
        "Roster,,,,,\nStudent name,UO ID,Major,Class,Credits,Email\n\"Baker-Rozell, Charles \
         W\",951000001,CS,SR,4,cb@example.edu\n",
    )
    .expect("write roster");

    let (summary, text) = run_batch(&root, &GradeOptions::default()).await;
    let summary = summary.expect("batch should finish");

    assert_eq!(summary.graded, 1);
    assert_eq!(summary.unresolved, 1);
    assert!(text.contains("Baker-Rozell, Charles W => "));
    assert!(text.contains("=== End of Baker-Rozell, Charles W ==="));
    assert!(text.contains("*** UNMATCHED SUBMISSION"));
    assert!(text.contains("stranger_8_q1.py"));

    let table = load_roster(&root.join("grader.ini"), None).expect("roster");
    assert_eq!(
        table.iter().collect::<Vec<_>>(),
        vec![("bakerrozellcharles", "Baker-Rozell, Charles W")]
    );

    let _ = fs::remove_dir_all(root);
}
