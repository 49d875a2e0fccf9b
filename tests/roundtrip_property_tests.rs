use trcodec::formats::codec_for;
use trcodec::formats::po;
use trcodec::handler::{compile, parse_source, parse_translation};
use trcodec::language::{LanguageCatalog, builtin_catalog};
use trcodec::{CompileOptions, I18nMethod, MemoryStore, Resource};

use proptest::prelude::*;

use std::collections::BTreeMap;

fn key_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9]{0,15}").expect("valid key regex")
}

fn value_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9 \\-\\.,!\\?]{1,30}").expect("valid value regex")
}

// No spaces: a properties value keeps inner spaces, but surrounding ones
// belong to the separator.
fn compact_value_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9\\-\\.,!\\?]{1,30}").expect("valid value regex")
}

fn spaced_dataset_strategy() -> impl Strategy<Value = BTreeMap<String, (String, String)>> {
    prop::collection::btree_map(key_strategy(), (value_strategy(), value_strategy()), 1..8)
}

fn compact_dataset_strategy() -> impl Strategy<Value = BTreeMap<String, (String, String)>> {
    prop::collection::btree_map(
        key_strategy(),
        (compact_value_strategy(), compact_value_strategy()),
        1..8,
    )
}

fn po_dataset_strategy() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map(key_strategy(), value_strategy(), 1..8)
}

fn expected_translated_map(
    values: &BTreeMap<String, (String, String)>,
) -> BTreeMap<String, String> {
    values
        .iter()
        .map(|(key, (_, translated))| (key.clone(), translated.clone()))
        .collect()
}

fn properties_body(values: &BTreeMap<String, (String, String)>, translated: bool) -> String {
    values
        .iter()
        .map(|(key, (source, target))| {
            let value = if translated { target } else { source };
            format!("{key} = {value}\n")
        })
        .collect()
}

fn strings_body(values: &BTreeMap<String, (String, String)>, translated: bool) -> String {
    values
        .iter()
        .map(|(key, (source, target))| {
            let value = if translated { target } else { source };
            format!("\"{key}\" = \"{value}\";\n")
        })
        .collect()
}

fn joomla_body(values: &BTreeMap<String, (String, String)>, translated: bool) -> String {
    values
        .iter()
        .map(|(key, (source, target))| {
            let value = if translated { target } else { source };
            format!("{key}=\"{value}\"\n")
        })
        .collect()
}

fn po_source_body(values: &BTreeMap<String, String>) -> String {
    values
        .keys()
        .map(|key| format!("msgid \"{key}\"\nmsgstr \"\"\n\n"))
        .collect()
}

fn po_translation_body(values: &BTreeMap<String, String>) -> String {
    values
        .iter()
        .map(|(key, value)| format!("msgid \"{key}\"\nmsgstr \"{value}\"\n\n"))
        .collect()
}

/// Parses a source and a fully translated file, stores the rows and
/// compiles the template back for French.
fn compile_through_store(
    method: I18nMethod,
    source: &str,
    translation: &str,
) -> Result<String, String> {
    let codec = codec_for(method);
    let resource = Resource::new("app", "en");
    let en = builtin_catalog()
        .language_for("en")
        .map_err(|e| e.to_string())?;
    let fr = builtin_catalog()
        .language_for("fr")
        .map_err(|e| e.to_string())?;

    let outcome =
        parse_source(codec, &resource, &en, source.as_bytes()).map_err(|e| e.to_string())?;
    let mut store = MemoryStore::new();
    store.ingest_source(&resource, &outcome.stringset);

    let rows = parse_translation(codec, &resource, &fr, translation.as_bytes())
        .map_err(|e| e.to_string())?;
    store.ingest_translations(&resource, &fr, &rows.stringset, false);

    compile(
        codec,
        &outcome.template,
        &resource,
        &fr,
        &store,
        &CompileOptions::default(),
    )
    .map_err(|e| e.to_string())
}

/// Re-parses a compiled file and collects its rows by source entity.
fn recovered_map(method: I18nMethod, content: &str) -> Result<BTreeMap<String, String>, String> {
    let codec = codec_for(method);
    let resource = Resource::new("app", "en");
    let fr = builtin_catalog()
        .language_for("fr")
        .map_err(|e| e.to_string())?;
    let outcome = parse_translation(codec, &resource, &fr, content.as_bytes())
        .map_err(|e| e.to_string())?;
    Ok(outcome
        .stringset
        .iter()
        .map(|row| (row.source_entity.clone(), row.translation.clone()))
        .collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn properties_store_compile_roundtrip_preserves_translations(values in compact_dataset_strategy()) {
        let compiled = compile_through_store(
            I18nMethod::Properties,
            &properties_body(&values, false),
            &properties_body(&values, true),
        )
        .map_err(TestCaseError::fail)?;

        let actual = recovered_map(I18nMethod::Properties, &compiled)
            .map_err(TestCaseError::fail)?;
        prop_assert_eq!(actual, expected_translated_map(&values));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn strings_store_compile_roundtrip_preserves_translations(values in spaced_dataset_strategy()) {
        let compiled = compile_through_store(
            I18nMethod::Strings,
            &strings_body(&values, false),
            &strings_body(&values, true),
        )
        .map_err(TestCaseError::fail)?;

        let actual = recovered_map(I18nMethod::Strings, &compiled)
            .map_err(TestCaseError::fail)?;
        prop_assert_eq!(actual, expected_translated_map(&values));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn joomla_store_compile_roundtrip_preserves_translations(values in spaced_dataset_strategy()) {
        let compiled = compile_through_store(
            I18nMethod::Ini,
            &joomla_body(&values, false),
            &joomla_body(&values, true),
        )
        .map_err(TestCaseError::fail)?;

        let actual = recovered_map(I18nMethod::Ini, &compiled)
            .map_err(TestCaseError::fail)?;
        prop_assert_eq!(actual, expected_translated_map(&values));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn po_store_compile_roundtrip_preserves_translations(values in po_dataset_strategy()) {
        let compiled = compile_through_store(
            I18nMethod::Po,
            &po_source_body(&values),
            &po_translation_body(&values),
        )
        .map_err(TestCaseError::fail)?;

        let actual = recovered_map(I18nMethod::Po, &compiled)
            .map_err(TestCaseError::fail)?;
        prop_assert_eq!(actual, values);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn po_escape_unescape_roundtrip_preserves_text(
        text in proptest::string::string_regex("[A-Za-z0-9 \\\\\"\n\t]{0,40}").expect("valid regex")
    ) {
        prop_assert_eq!(po::unescape(&po::escape(&text)), text);
    }
}
