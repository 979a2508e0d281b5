pub mod fixtures;

use fixtures::*;
use gestalt::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn char_too_long_keeps_first_code_point_with_a_warning() {
    let gestalt = setup_gestalt(&[("db.port", "aaa")]);

    // Relaxed mode: the warning is logged, the first code point survives.
    assert_eq!(gestalt.get_config::<char>("db.port").unwrap(), 'a');
}

#[test]
fn char_too_long_fails_when_warnings_are_errors() {
    let gestalt = GestaltBuilder::new()
        .add_source(MapSource::new("test", vec![("db.port", "aaa")]))
        .treat_warnings_as_errors(true)
        .build()
        .unwrap();
    gestalt.load_configs().unwrap();

    let error = gestalt.get_config::<char>("db.port").unwrap_err();
    assert!(error.to_string().contains("received the wrong size"));
}

#[test]
fn char_empty_is_an_error_with_no_result() {
    let gestalt = setup_gestalt(&[("db.port", "")]);
    let error = gestalt.get_config::<char>("db.port").unwrap_err();
    assert!(error.to_string().contains("received the wrong size"));
}

#[test]
fn comma_separated_leaf_decodes_as_int_array() {
    let gestalt = setup_gestalt(&[("xs", "1, 2 ,3")]);
    assert_eq!(gestalt.get_config::<Vec<i32>>("xs").unwrap(), vec![1, 2, 3]);
}

#[test]
fn indexed_entries_decode_as_array() {
    let gestalt = setup_gestalt(&[("xs[0]", "10"), ("xs[1]", "20"), ("xs[2]", "30")]);
    assert_eq!(gestalt.get_config::<Vec<u64>>("xs").unwrap(), vec![10, 20, 30]);
}

#[test]
fn duration_from_integer_is_milliseconds() {
    let gestalt = setup_gestalt(&[("timeout", "500")]);
    assert_eq!(
        gestalt.get_config::<Duration>("timeout").unwrap(),
        Duration::from_millis(500)
    );
}

#[test]
fn duration_from_iso_pattern() {
    let gestalt = setup_gestalt(&[("timeout", "PT1M30S")]);
    assert_eq!(
        gestalt.get_config::<Duration>("timeout").unwrap(),
        Duration::from_secs(90)
    );
}

#[test]
fn derived_struct_decodes_field_by_field() {
    let gestalt = setup_gestalt(&[
        ("db.host", "localhost"),
        ("db.port", "5432"),
        ("db.timeout", "250"),
    ]);

    let db: DbConfig = gestalt.get_config("db").unwrap();
    assert_eq!(
        db,
        DbConfig { host: "localhost".to_owned(), port: 5432, timeout: Some(250) }
    );
}

#[test]
fn derived_struct_optional_field_absorbs_absence() {
    let gestalt = setup_gestalt(&[("db.host", "localhost"), ("db.port", "5432")]);
    let db: DbConfig = gestalt.get_config("db").unwrap();
    assert_eq!(db.timeout, None);
}

#[test]
fn derived_struct_missing_required_field_fails() {
    let gestalt = setup_gestalt(&[("db.host", "localhost")]);
    let error = gestalt.get_config::<DbConfig>("db").unwrap_err();
    assert!(error.to_string().contains("db.port"));
}

#[test]
fn derived_struct_honors_rename_and_defaults() {
    let gestalt = setup_gestalt(&[("pool.maxTotal", "16")]);
    let pool: PoolConfig = gestalt.get_config("pool").unwrap();
    assert_eq!(
        pool,
        PoolConfig { max_total: 16, retries: 3, label: String::new() }
    );
}

#[test]
fn derived_struct_finds_snake_case_keys_for_renamed_fields() {
    // The key is stored snake_case but looked up by the camelCase rename;
    // the snake-case path mapper bridges the two.
    let gestalt = setup_gestalt(&[("pool.max_total", "8")]);
    let pool: PoolConfig = gestalt.get_config("pool").unwrap();
    assert_eq!(pool.max_total, 8);
}

#[test]
fn null_field_fails_under_null_in_class_policy() {
    let gestalt = GestaltBuilder::new()
        .add_source(MapSource::new("test", vec![("db.host", "h"), ("db.port", "1")]))
        .treat_null_values_in_class_as_errors(true)
        .build()
        .unwrap();
    gestalt.load_configs().unwrap();

    let error = gestalt.get_config::<DbConfig>("db").unwrap_err();
    assert!(error.to_string().contains("null value"));
}

#[test]
fn missing_field_promotes_to_hard_error_under_policy() {
    let gestalt = GestaltBuilder::new()
        .add_source(MapSource::new("test", vec![("db.host", "h")]))
        .treat_missing_values_as_errors(true)
        .build()
        .unwrap();
    gestalt.load_configs().unwrap();

    // Promoted absences are not absorbable by a provided default.
    assert!(gestalt.get_config_or::<DbConfig>(
        "db",
        DbConfig { host: "fallback".to_owned(), port: 1, timeout: None }
    )
    .is_err());
}

#[test]
fn enum_decodes_case_insensitively() {
    let gestalt = setup_gestalt(&[
        ("a", "PRIMARY"),
        ("b", "replica"),
        ("c", "Stand-By"),
        ("d", "unknown"),
    ]);

    assert_eq!(gestalt.get_config::<Mode>("a").unwrap(), Mode::Primary);
    assert_eq!(gestalt.get_config::<Mode>("b").unwrap(), Mode::Replica);
    assert_eq!(gestalt.get_config::<Mode>("c").unwrap(), Mode::Standby);
    assert!(gestalt.get_config::<Mode>("d").is_err());
}

#[test]
fn string_keyed_map_decodes() {
    let gestalt = setup_gestalt(&[("limits.read", "10"), ("limits.write", "5")]);
    let limits: HashMap<String, u32> = gestalt.get_config("limits").unwrap();
    assert_eq!(limits.get("read"), Some(&10));
    assert_eq!(limits.get("write"), Some(&5));
}

#[test]
fn uuid_and_path_decode() {
    let gestalt = setup_gestalt(&[
        ("node.id", "67e55044-10b1-426f-9247-bb680e5fe0c8"),
        ("node.data_dir", "/var/lib/app"),
    ]);

    assert!(gestalt.get_config::<uuid::Uuid>("node.id").is_ok());
    assert_eq!(
        gestalt.get_config::<PathBuf>("node.data_dir").unwrap(),
        PathBuf::from("/var/lib/app")
    );
}

#[test]
fn dates_honor_configured_formats() {
    let gestalt = GestaltBuilder::new()
        .add_source(MapSource::new("test", vec![("launch", "17/05/2024")]))
        .local_date_format("%d/%m/%Y")
        .build()
        .unwrap();
    gestalt.load_configs().unwrap();

    assert_eq!(
        gestalt.get_config::<chrono::NaiveDate>("launch").unwrap(),
        chrono::NaiveDate::from_ymd_opt(2024, 5, 17).unwrap()
    );
}

#[test]
fn custom_decoder_overrides_builtin_recursively() {
    struct TrimmedQuotes;

    impl Decoder<String> for TrimmedQuotes {
        fn name(&self) -> &'static str {
            "TrimmedQuotes"
        }

        fn priority(&self) -> Priority {
            Priority::High
        }

        fn decode(
            &self,
            path: &str,
            node: &ConfigNode,
            _ctx: &DecodeContext<'_>,
        ) -> Validated<String> {
            gestalt::decode::leaf_value(path, node, "String")
                .map(|raw| raw.trim_matches('"').to_owned())
        }
    }

    let gestalt = GestaltBuilder::new()
        .add_source(MapSource::new("test", vec![("names", "\"a\",\"b\"")]))
        .add_decoder::<String>(TrimmedQuotes)
        .build()
        .unwrap();
    gestalt.load_configs().unwrap();

    // The override applies to every element of the array, proving that
    // composition re-enters registry dispatch.
    assert_eq!(
        gestalt.get_config::<Vec<String>>("names").unwrap(),
        vec!["a".to_owned(), "b".to_owned()]
    );
}
