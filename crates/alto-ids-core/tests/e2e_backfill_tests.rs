use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::tempdir;

use alto_ids_core::backup::{BackupManager, VersionedBackup};
use alto_ids_core::detector;
use alto_ids_core::locator::{self, Role, ID_ATTRIBUTE};
use alto_ids_core::xml::Document;
use alto_ids_core::{AppConfig, BackfillEngine, Error, Outcome, RunReport, SilentReporter};

const ALTO_NS: &str = "http://www.loc.gov/standards/alto/ns-v4#";

/// Page with one labelled block and one block, line and two words without IDs.
fn page_with_gaps() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<alto xmlns="{ALTO_NS}">
  <Layout>
    <Page ID="P1">
      <PrintSpace>
        <TextBlock ID="B_1" HPOS="10" VPOS="20">
          <TextLine ID="L_1">
            <String ID="S_1" CONTENT="Goobi"/>
          </TextLine>
        </TextBlock>
        <TextBlock HPOS="30" VPOS="40">
          <TextLine>
            <String CONTENT="Hello"/>
            <SP/>
            <String CONTENT="world"/>
          </TextLine>
        </TextBlock>
      </PrintSpace>
    </Page>
  </Layout>
</alto>
"#
    )
}

fn complete_page() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<alto xmlns="{ALTO_NS}">
  <Layout>
    <Page ID="P2">
      <PrintSpace>
        <TextBlock ID="TextBlock_1">
          <TextLine ID="TextLine_1">
            <String ID="TextWord_1" CONTENT="done"/>
          </TextLine>
        </TextBlock>
      </PrintSpace>
    </Page>
  </Layout>
</alto>
"#
    )
}

/// Layout:
///   root/
///     ocr/
///       alto/      (pages)
///       txt/0001.txt
fn create_ocr_tree(root: &Path, pages: &[(&str, String)]) -> PathBuf {
    let ocr = root.join("ocr");
    let alto = ocr.join("alto");
    let txt = ocr.join("txt");
    fs::create_dir_all(&alto).unwrap();
    fs::create_dir_all(&txt).unwrap();
    fs::write(txt.join("0001.txt"), "Hello world").unwrap();
    for (name, content) in pages {
        fs::write(alto.join(name), content).unwrap();
    }
    ocr
}

fn ids_of(path: &Path, role: Role) -> Vec<Option<String>> {
    let doc = Document::from_path(path).unwrap();
    locator::locate_role(&doc, role)
        .into_iter()
        .map(|id| {
            doc.element(id)
                .unwrap()
                .attribute(ID_ATTRIBUTE)
                .map(str::to_string)
        })
        .collect()
}

fn some(ids: &[&str]) -> Vec<Option<String>> {
    ids.iter().map(|id| Some(id.to_string())).collect()
}

fn expect_success(outcome: Outcome) -> RunReport {
    match outcome {
        Outcome::Success(report) => report,
        Outcome::Failure { message } => panic!("run failed: {}", message),
    }
}

fn expect_failure(outcome: Outcome) -> String {
    match outcome {
        Outcome::Failure { message } => message,
        Outcome::Success(report) => panic!("expected failure, got {:?}", report),
    }
}

struct FailingBackup;

impl BackupManager for FailingBackup {
    fn create_backup(&self, parent: &Path, name: &str, _recursive: bool) -> Result<PathBuf, Error> {
        Err(Error::Backup {
            path: parent.join(name),
            message: "disk full".to_string(),
        })
    }
}

/// Captures the ALTO file contents at the moment the backup is taken.
#[derive(Clone, Default)]
struct RecordingBackup {
    seen: Arc<Mutex<Vec<String>>>,
    recursive: Arc<Mutex<Vec<bool>>>,
}

impl BackupManager for RecordingBackup {
    fn create_backup(&self, parent: &Path, name: &str, recursive: bool) -> Result<PathBuf, Error> {
        self.recursive.lock().unwrap().push(recursive);
        let alto = parent.join(name).join("alto");
        let mut seen = self.seen.lock().unwrap();
        for entry in fs::read_dir(&alto).unwrap() {
            seen.push(fs::read_to_string(entry.unwrap().path()).unwrap());
        }
        Ok(parent.join(format!("{}.recorded", name)))
    }
}

#[test]
fn test_full_backfill_pipeline() {
    let tmp = tempdir().unwrap();
    let ocr = create_ocr_tree(
        tmp.path(),
        &[("0001.xml", page_with_gaps()), ("0002.xml", complete_page())],
    );

    let engine = BackfillEngine::new(AppConfig::for_ocr_dir(&ocr));
    let report = expect_success(engine.run(&SilentReporter));

    assert_eq!(report.files_scanned, 2);
    assert!(report.gap_found);
    assert_eq!(report.files_rewritten, 2);
    assert_eq!(report.ids_assigned.blocks, 1);
    assert_eq!(report.ids_assigned.lines, 1);
    assert_eq!(report.ids_assigned.words, 2);

    let page = ocr.join("alto").join("0001.xml");
    assert_eq!(ids_of(&page, Role::Block), some(&["B_1", "TextBlock_1"]));
    assert_eq!(ids_of(&page, Role::Line), some(&["L_1", "TextLine_1"]));
    assert_eq!(
        ids_of(&page, Role::Word),
        some(&["S_1", "TextWord_1", "TextWord_2"])
    );
    assert!(!detector::file_has_gap(&page).unwrap());

    // Untouched attributes and the namespace survive the rewrite
    let doc = Document::from_path(&page).unwrap();
    let root = doc.element(doc.root()).unwrap();
    assert_eq!(root.attribute("xmlns"), Some(ALTO_NS));
    let blocks = locator::locate_role(&doc, Role::Block);
    let second = doc.element(blocks[1]).unwrap();
    assert_eq!(second.attribute("HPOS"), Some("30"));
    assert_eq!(second.attribute("VPOS"), Some("40"));

    // Backup holds the pre-mutation state of the whole OCR directory
    let backup = report.backup_path.expect("backup path");
    assert_eq!(backup, tmp.path().join("ocr.1"));
    assert_eq!(
        fs::read_to_string(backup.join("alto").join("0001.xml")).unwrap(),
        page_with_gaps()
    );
    assert_eq!(
        fs::read_to_string(backup.join("txt").join("0001.txt")).unwrap(),
        "Hello world"
    );
}

#[test]
fn test_no_gaps_means_no_backup_and_no_writes() {
    let tmp = tempdir().unwrap();
    let ocr = create_ocr_tree(tmp.path(), &[("0001.xml", complete_page())]);

    let engine = BackfillEngine::new(AppConfig::for_ocr_dir(&ocr));
    let report = expect_success(engine.run(&SilentReporter));

    assert!(!report.gap_found);
    assert_eq!(report.files_rewritten, 0);
    assert!(report.backup_path.is_none());
    assert!(!tmp.path().join("ocr.1").exists());
    assert_eq!(
        fs::read_to_string(ocr.join("alto").join("0001.xml")).unwrap(),
        complete_page()
    );
}

#[test]
fn test_second_run_is_a_no_op() {
    let tmp = tempdir().unwrap();
    let ocr = create_ocr_tree(tmp.path(), &[("0001.xml", page_with_gaps())]);
    let page = ocr.join("alto").join("0001.xml");

    let engine = BackfillEngine::new(AppConfig::for_ocr_dir(&ocr));
    expect_success(engine.run(&SilentReporter));
    let after_first = fs::read_to_string(&page).unwrap();

    let report = expect_success(engine.run(&SilentReporter));
    assert!(!report.gap_found);
    assert!(report.backup_path.is_none());
    assert!(!tmp.path().join("ocr.2").exists());
    assert_eq!(fs::read_to_string(&page).unwrap(), after_first);
}

#[test]
fn test_backup_failure_leaves_files_untouched() {
    let tmp = tempdir().unwrap();
    let ocr = create_ocr_tree(
        tmp.path(),
        &[("0001.xml", page_with_gaps()), ("0002.xml", page_with_gaps())],
    );

    let engine =
        BackfillEngine::new(AppConfig::for_ocr_dir(&ocr)).with_backup_manager(FailingBackup);
    let message = expect_failure(engine.run(&SilentReporter));

    assert!(message.contains("disk full"));
    for name in ["0001.xml", "0002.xml"] {
        assert_eq!(
            fs::read_to_string(ocr.join("alto").join(name)).unwrap(),
            page_with_gaps()
        );
    }
}

#[test]
fn test_backup_taken_before_any_write() {
    let tmp = tempdir().unwrap();
    let ocr = create_ocr_tree(
        tmp.path(),
        &[("0001.xml", page_with_gaps()), ("0002.xml", page_with_gaps())],
    );

    let recorder = RecordingBackup::default();
    let engine =
        BackfillEngine::new(AppConfig::for_ocr_dir(&ocr)).with_backup_manager(recorder.clone());
    let report = expect_success(engine.run(&SilentReporter));

    let seen = recorder.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|content| *content == page_with_gaps()));
    assert_eq!(report.backup_path, Some(tmp.path().join("ocr.recorded")));
    // One backup per run, always including the ALTO subfolder
    assert_eq!(*recorder.recursive.lock().unwrap(), vec![true]);
}

#[test]
fn test_stale_recursive_setting_still_backs_up_alto_folder() {
    let tmp = tempdir().unwrap();
    let page = "<alto><TextBlock/></alto>";
    let ocr = create_ocr_tree(tmp.path(), &[("0001.xml", page.to_string())]);
    let config_path = tmp.path().join("alto-ids.toml");
    fs::write(
        &config_path,
        format!(
            "ocr_dir = {:?}\n\n[backup]\nretention = 2\nrecursive = false\n",
            ocr.to_string_lossy()
        ),
    )
    .unwrap();

    let config = alto_ids_core::config::load_configuration_from(Some(&config_path)).unwrap();
    let report = expect_success(BackfillEngine::new(config).run(&SilentReporter));

    let backup = report.backup_path.expect("backup path");
    assert_eq!(
        fs::read_to_string(backup.join("alto").join("0001.xml")).unwrap(),
        page
    );
}

#[test]
fn test_malformed_file_stops_write_pass() {
    let tmp = tempdir().unwrap();
    let ocr = create_ocr_tree(
        tmp.path(),
        &[
            ("0001.xml", page_with_gaps()),
            ("0002.xml", "<alto><TextBlock></alto>".to_string()),
            ("0003.xml", page_with_gaps()),
        ],
    );
    let alto = ocr.join("alto");

    let engine = BackfillEngine::new(AppConfig::for_ocr_dir(&ocr));
    let message = expect_failure(engine.run(&SilentReporter));

    assert!(message.contains("XML parse error"), "{}", message);
    assert!(message.contains("0002.xml"), "{}", message);

    // Files before the broken one keep their new IDs, later files are untouched
    assert!(!detector::file_has_gap(&alto.join("0001.xml")).unwrap());
    assert_eq!(
        fs::read_to_string(alto.join("0003.xml")).unwrap(),
        page_with_gaps()
    );
    assert!(tmp.path().join("ocr.1").exists());
}

#[test]
fn test_malformed_file_during_detection_aborts_before_backup() {
    let tmp = tempdir().unwrap();
    let ocr = create_ocr_tree(
        tmp.path(),
        &[
            ("0001.xml", "<alto>".to_string()),
            ("0002.xml", page_with_gaps()),
        ],
    );

    let engine = BackfillEngine::new(AppConfig::for_ocr_dir(&ocr));
    let message = expect_failure(engine.run(&SilentReporter));

    assert!(message.contains("0001.xml"));
    assert!(!tmp.path().join("ocr.1").exists());
    assert_eq!(
        fs::read_to_string(ocr.join("alto").join("0002.xml")).unwrap(),
        page_with_gaps()
    );
}

#[test]
fn test_missing_alto_directory_is_failure() {
    let tmp = tempdir().unwrap();
    let engine = BackfillEngine::new(AppConfig::for_ocr_dir(tmp.path().join("ocr")));
    let message = expect_failure(engine.run(&SilentReporter));
    assert!(message.contains("IO error"));
}

#[test]
fn test_generated_ids_skip_existing_values() {
    let tmp = tempdir().unwrap();
    let page = r#"<alto>
  <TextBlock ID="TextBlock_1"/>
  <TextBlock/>
  <TextBlock ID="TextBlock_3"/>
  <TextBlock/>
</alto>"#;
    let ocr = create_ocr_tree(tmp.path(), &[("0001.xml", page.to_string())]);

    let engine = BackfillEngine::new(AppConfig::for_ocr_dir(&ocr));
    expect_success(engine.run(&SilentReporter));

    assert_eq!(
        ids_of(&ocr.join("alto").join("0001.xml"), Role::Block),
        some(&["TextBlock_1", "TextBlock_2", "TextBlock_3", "TextBlock_4"])
    );
}

#[test]
fn test_uniqueness_is_scoped_per_file() {
    let tmp = tempdir().unwrap();
    let page = "<alto><TextBlock/></alto>";
    let ocr = create_ocr_tree(
        tmp.path(),
        &[("0001.xml", page.to_string()), ("0002.xml", page.to_string())],
    );

    let engine = BackfillEngine::new(AppConfig::for_ocr_dir(&ocr));
    expect_success(engine.run(&SilentReporter));

    for name in ["0001.xml", "0002.xml"] {
        assert_eq!(
            ids_of(&ocr.join("alto").join(name), Role::Block),
            some(&["TextBlock_1"])
        );
    }
}

#[test]
fn test_file_without_structural_elements_is_unchanged() {
    let tmp = tempdir().unwrap();
    let empty_page = "<alto><Description/><Layout><Page ID=\"P1\"/></Layout></alto>";
    let ocr = create_ocr_tree(
        tmp.path(),
        &[("0001.xml", empty_page.to_string()), ("0002.xml", page_with_gaps())],
    );

    let engine = BackfillEngine::new(AppConfig::for_ocr_dir(&ocr));
    let report = expect_success(engine.run(&SilentReporter));
    assert_eq!(report.files_rewritten, 2);

    let doc = Document::from_path(&ocr.join("alto").join("0001.xml")).unwrap();
    assert_eq!(detector::count_gaps(&doc).total(), 0);
    let page = doc.element(doc.root()).unwrap();
    assert_eq!(page.children.len(), 2);
}

#[test]
fn test_custom_prefixes() {
    let tmp = tempdir().unwrap();
    let ocr = create_ocr_tree(tmp.path(), &[("0001.xml", page_with_gaps())]);

    let mut config = AppConfig::for_ocr_dir(&ocr);
    config.prefixes.block_prefix = "block-".to_string();
    config.prefixes.word_prefix = "w".to_string();
    let engine = BackfillEngine::new(config);
    expect_success(engine.run(&SilentReporter));

    let page = ocr.join("alto").join("0001.xml");
    assert_eq!(ids_of(&page, Role::Block), some(&["B_1", "block-1"]));
    assert_eq!(ids_of(&page, Role::Word), some(&["S_1", "w1", "w2"]));
}

#[test]
fn test_shared_prefixes_rejected_before_any_work() {
    let tmp = tempdir().unwrap();
    let ocr = create_ocr_tree(tmp.path(), &[("0001.xml", page_with_gaps())]);

    let mut config = AppConfig::for_ocr_dir(&ocr);
    config.prefixes.line_prefix = config.prefixes.block_prefix.clone();
    let message = expect_failure(BackfillEngine::new(config).run(&SilentReporter));

    assert!(message.contains("Invalid configuration"));
    assert!(!tmp.path().join("ocr.1").exists());
}

#[test]
fn test_check_lists_every_file_with_gaps() {
    let tmp = tempdir().unwrap();
    let ocr = create_ocr_tree(
        tmp.path(),
        &[
            ("0001.xml", page_with_gaps()),
            ("0002.xml", complete_page()),
            ("0003.xml", page_with_gaps()),
        ],
    );

    let engine = BackfillEngine::new(AppConfig::for_ocr_dir(&ocr));
    let summary = engine.check(&SilentReporter).unwrap();

    assert_eq!(summary.files_scanned, 3);
    let names: Vec<String> = summary
        .files_with_gaps
        .iter()
        .map(|(path, _)| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["0001.xml", "0003.xml"]);
    assert_eq!(summary.total().words, 4);

    // check never writes or backs up
    assert!(!tmp.path().join("ocr.1").exists());
    assert_eq!(
        fs::read_to_string(ocr.join("alto").join("0001.xml")).unwrap(),
        page_with_gaps()
    );
}

#[test]
fn test_versioned_backup_used_by_default() {
    let tmp = tempdir().unwrap();
    let ocr = create_ocr_tree(tmp.path(), &[("0001.xml", page_with_gaps())]);

    let mut config = AppConfig::for_ocr_dir(&ocr);
    config.backup.retention = 1;
    let engine = BackfillEngine::new(config).with_backup_manager(VersionedBackup::new(1));
    let report = expect_success(engine.run(&SilentReporter));
    assert_eq!(report.backup_path, Some(tmp.path().join("ocr.1")));
}

#[test]
fn test_latin1_page_keeps_its_encoding() {
    let tmp = tempdir().unwrap();
    let ocr = create_ocr_tree(tmp.path(), &[]);
    let page = ocr.join("alto").join("0001.xml");
    fs::write(
        &page,
        b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n\
          <alto><TextBlock><TextLine><String CONTENT=\"caf\xe9\"/></TextLine></TextBlock></alto>\n",
    )
    .unwrap();

    let engine = BackfillEngine::new(AppConfig::for_ocr_dir(&ocr));
    expect_success(engine.run(&SilentReporter));

    let bytes = fs::read(&page).unwrap();
    assert!(bytes.starts_with(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>"));
    assert!(bytes.windows(5).any(|w| w == b"caf\xe9\""));
    assert_eq!(ids_of(&page, Role::Word), some(&["TextWord_1"]));
}

#[test]
fn test_undecodable_page_is_a_parse_error() {
    let tmp = tempdir().unwrap();
    let ocr = create_ocr_tree(tmp.path(), &[]);
    let page = ocr.join("alto").join("0001.xml");
    fs::write(&page, b"<alto><TextBlock><String CONTENT=\"caf\xe9\"/></TextBlock></alto>").unwrap();

    let err = Document::from_path(&page).unwrap_err();
    assert!(matches!(err, Error::Parse { .. }), "{}", err);

    let engine = BackfillEngine::new(AppConfig::for_ocr_dir(&ocr));
    let message = expect_failure(engine.run(&SilentReporter));
    assert!(message.contains("XML parse error"), "{}", message);
    assert!(!tmp.path().join("ocr.1").exists());
}
