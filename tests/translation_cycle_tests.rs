use std::fs;

use indoc::indoc;
use trcodec::formats::codec_for;
use trcodec::handler::{compile, parse_source, parse_translation};
use trcodec::language::{Language, LanguageCatalog, builtin_catalog};
use trcodec::pseudo::BracketsPseudo;
use trcodec::{CompileOptions, I18nMethod, MemoryStore, Mode, Resource, Session};

fn language(code: &str) -> Language {
    builtin_catalog()
        .language_for(code)
        .unwrap_or_else(|e| panic!("language {code} should exist: {e}"))
}

#[test]
fn russian_plural_expansion_matches_target_slot_count() {
    let source = indoc! {r#"
        msgid ""
        msgstr ""
        "Content-Type: text/plain; charset=UTF-8\n"
        "Plural-Forms: nplurals=2; plural=(n != 1);\n"

        msgid "Hello"
        msgstr ""

        msgid "%d file"
        msgid_plural "%d files"
        msgstr[0] ""
        msgstr[1] ""
    "#};
    let translated = indoc! {r#"
        msgid "%d file"
        msgid_plural "%d files"
        msgstr[0] "%d файл"
        msgstr[1] "%d файла"
        msgstr[2] "%d файлов"
    "#};

    let codec = codec_for(I18nMethod::Po);
    let resource = Resource::new("app", "en");
    let en = language("en");
    let ru = language("ru");

    let outcome = parse_source(codec, &resource, &en, source.as_bytes()).expect("parse source");
    let mut store = MemoryStore::new();
    store.ingest_source(&resource, &outcome.stringset);

    let rows = parse_translation(codec, &resource, &ru, translated.as_bytes())
        .expect("parse russian translation");
    assert_eq!(
        store.ingest_translations(&resource, &ru, &rows.stringset, false),
        3
    );

    let compiled = compile(
        codec,
        &outcome.template,
        &resource,
        &ru,
        &store,
        &CompileOptions::default(),
    )
    .expect("compile for russian");

    // The two-slot template grew to the three Russian forms.
    assert!(compiled.contains("msgstr[0] \"%d файл\""));
    assert!(compiled.contains("msgstr[1] \"%d файла\""));
    assert!(compiled.contains("msgstr[2] \"%d файлов\""));
    assert_eq!(compiled.matches("msgstr[").count(), 3);
    // Header metadata follows the target language.
    assert!(compiled.contains(r#""Language: ru\n""#));
    assert!(compiled.contains("nplurals=3"));
    assert!(!compiled.contains("nplurals=2"));
    // The untranslated singular stays empty.
    assert!(compiled.contains("msgid \"Hello\"\nmsgstr \"\""));
}

struct ModeCase {
    name: &'static str,
    mode: Mode,
    expect: &'static [&'static str],
    reject: &'static [&'static str],
}

#[test]
fn mode_selection_controls_which_rows_compile() {
    let source = indoc! {r#"
        msgid "Hello"
        msgstr ""

        msgid "Goodbye"
        msgstr ""
    "#};

    let codec = codec_for(I18nMethod::Po);
    let resource = Resource::new("app", "en");
    let en = language("en");
    let fr = language("fr");

    let outcome = parse_source(codec, &resource, &en, source.as_bytes()).expect("parse source");
    let mut store = MemoryStore::new();
    store.ingest_source(&resource, &outcome.stringset);

    let reviewed = parse_translation(
        codec,
        &resource,
        &fr,
        b"msgid \"Hello\"\nmsgstr \"Bonjour\"\n",
    )
    .expect("parse reviewed translation");
    store.ingest_translations(&resource, &fr, &reviewed.stringset, true);

    let unreviewed = parse_translation(
        codec,
        &resource,
        &fr,
        b"msgid \"Goodbye\"\nmsgstr \"Au revoir\"\n",
    )
    .expect("parse unreviewed translation");
    store.ingest_translations(&resource, &fr, &unreviewed.stringset, false);

    let cases = vec![
        ModeCase {
            name: "default mode sees every stored row",
            mode: Mode::DEFAULT,
            expect: &["msgstr \"Bonjour\"", "msgstr \"Au revoir\""],
            reject: &[],
        },
        ModeCase {
            name: "translated mode keeps the simple selection",
            mode: Mode::TRANSLATED,
            expect: &["msgstr \"Bonjour\"", "msgstr \"Au revoir\""],
            reject: &[],
        },
        ModeCase {
            name: "reviewed mode drops unreviewed rows",
            mode: Mode::REVIEWED,
            expect: &["msgstr \"Bonjour\"", "msgid \"Goodbye\"\nmsgstr \"\""],
            reject: &["Au revoir"],
        },
    ];

    for case in cases {
        let options = CompileOptions {
            mode: case.mode,
            ..CompileOptions::default()
        };
        let compiled = compile(codec, &outcome.template, &resource, &fr, &store, &options)
            .unwrap_or_else(|e| panic!("{}: compile failed: {e}", case.name));
        for needle in case.expect {
            assert!(
                compiled.contains(needle),
                "{}: compiled body is missing {needle:?}:\n{compiled}",
                case.name
            );
        }
        for needle in case.reject {
            assert!(
                !compiled.contains(needle),
                "{}: compiled body must not contain {needle:?}:\n{compiled}",
                case.name
            );
        }
    }
}

#[test]
fn pseudo_decoration_marks_untranslated_slots() {
    let source = indoc! {r#"
        msgid "Hello"
        msgstr ""

        msgid "Goodbye"
        msgstr ""
    "#};

    let codec = codec_for(I18nMethod::Po);
    let resource = Resource::new("app", "en");
    let en = language("en");
    let fr = language("fr");

    let outcome = parse_source(codec, &resource, &en, source.as_bytes()).expect("parse source");
    let mut store = MemoryStore::new();
    store.ingest_source(&resource, &outcome.stringset);

    let translated = parse_translation(
        codec,
        &resource,
        &fr,
        b"msgid \"Hello\"\nmsgstr \"Bonjour\"\n",
    )
    .expect("parse translation");
    store.ingest_translations(&resource, &fr, &translated.stringset, false);

    let options = CompileOptions {
        pseudo: Some(&BracketsPseudo),
        ..CompileOptions::default()
    };
    let compiled = compile(codec, &outcome.template, &resource, &fr, &store, &options)
        .expect("compile with pseudo");

    assert!(compiled.contains("msgstr \"[Bonjour]\""));
    // The pseudo runs on empty slots too, so missing translations show up.
    assert!(compiled.contains("msgstr \"[]\""));
}

#[test]
fn compiling_for_the_source_language_returns_source_text() {
    let codec = codec_for(I18nMethod::Properties);
    let resource = Resource::new("app", "en");
    let en = language("en");

    let outcome = parse_source(
        codec,
        &resource,
        &en,
        b"greeting = Hello\nfarewell = Goodbye\n",
    )
    .expect("parse source");
    let mut store = MemoryStore::new();
    store.ingest_source(&resource, &outcome.stringset);

    // Source ingestion stores the strings as reviewed rows of the source
    // language, so a compile for it needs no fill or comments.
    let compiled = compile(
        codec,
        &outcome.template,
        &resource,
        &en,
        &store,
        &CompileOptions::default(),
    )
    .expect("compile for the source language");
    assert_eq!(compiled, "greeting = Hello\nfarewell = Goodbye");
}

#[test]
fn session_compiles_multiple_languages_to_files() {
    let source = indoc! {r#"
        msgid ""
        msgstr ""
        "Content-Type: text/plain; charset=UTF-8\n"

        msgid "Hello"
        msgstr ""

        msgid "Goodbye"
        msgstr ""
    "#};

    let temp = tempfile::tempdir().expect("create temp dir");
    let source_path = temp.path().join("app.po");
    fs::write(&source_path, source).expect("write source file");

    let mut session = Session::new();
    let resource = Resource::new("app", "en");
    let report = session
        .ingest_source_file(&resource, &source_path)
        .expect("ingest source file");
    assert_eq!(report.method, I18nMethod::Po);
    assert_eq!(report.strings, 2);

    let fr_path = temp.path().join("fr.po");
    fs::write(&fr_path, "msgid \"Hello\"\nmsgstr \"Bonjour\"\n").expect("write french file");
    let fr_report = session
        .ingest_translation_file(&resource, "fr", &fr_path)
        .expect("ingest french file");
    assert_eq!(fr_report.strings, 1);

    let de_report = session
        .ingest_translation(
            &resource,
            "de",
            I18nMethod::Po,
            b"msgid \"Goodbye\"\nmsgstr \"Auf Wiedersehen\"\n",
        )
        .expect("ingest german bytes");
    assert_eq!(de_report.strings, 1);

    let fr_out = temp.path().join("out_fr.po");
    let de_out = temp.path().join("out_de.po");
    session
        .compile_to_file(&resource, "fr", &CompileOptions::default(), &fr_out)
        .expect("compile french file");
    session
        .compile_to_file(&resource, "de", &CompileOptions::default(), &de_out)
        .expect("compile german file");

    let fr_body = fs::read_to_string(&fr_out).expect("read french output");
    assert!(fr_body.contains("msgstr \"Bonjour\""));
    assert!(fr_body.contains(r#""Language: fr\n""#));
    assert!(!fr_body.contains("Auf Wiedersehen"));

    let de_body = fs::read_to_string(&de_out).expect("read german output");
    assert!(de_body.contains("msgstr \"Auf Wiedersehen\""));
    assert!(de_body.contains(r#""Language: de\n""#));
    assert!(!de_body.contains("Bonjour"));
}
