pub mod fixtures;

use fixtures::*;
use gestalt::prelude::*;
use std::io::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[test]
fn later_sources_win_merge_precedence() {
    let gestalt = GestaltBuilder::new()
        .add_source(MapSource::new("one", vec![("db.port", "1")]))
        .add_source(MapSource::new("two", vec![("db.port", "2"), ("db.host", "h")]))
        .build()
        .unwrap();
    gestalt.load_configs().unwrap();

    assert_eq!(gestalt.get_config::<i64>("db.port").unwrap(), 2);
    assert_eq!(gestalt.get_config::<String>("db.host").unwrap(), "h");
}

#[test]
fn substitution_with_default_falls_back_when_env_is_unset() {
    let gestalt = setup_gestalt(&[(
        "scratch",
        "${env:GESTALT_TEST_SURELY_UNSET_4711:=/tmp}",
    )]);
    assert_eq!(gestalt.get_config::<String>("scratch").unwrap(), "/tmp");
}

#[test]
fn substitution_reads_the_environment() {
    // PATH is present in any test environment; no env mutation needed.
    let expected = std::env::var("PATH").unwrap();
    let gestalt = setup_gestalt(&[("binpath", "${env:PATH}")]);
    assert_eq!(gestalt.get_config::<String>("binpath").unwrap(), expected);
}

#[test]
fn nested_substitution_resolves_through_the_tree() {
    let gestalt = setup_gestalt(&[("a", "${b}"), ("b", "${c}"), ("c", "x")]);
    assert_eq!(gestalt.get_config::<String>("a").unwrap(), "x");
}

#[test]
fn substitution_cycle_fails_the_load() {
    let gestalt = GestaltBuilder::new()
        .add_source(MapSource::new("test", vec![("a", "${b}"), ("b", "${a}")]))
        .build()
        .unwrap();

    let error = gestalt.load_configs().unwrap_err();
    let GestaltError::PostProcessing { errors } = error else {
        panic!("expected a post-processing failure, got {error}");
    };
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::SubstitutionCycle { .. })));
}

#[test]
fn substitution_depth_limit_fails_the_load() {
    // `a` needs one level of nesting to resolve, which a zero depth budget
    // forbids; the non-nested `b` and `c` leaves are unaffected.
    let gestalt = GestaltBuilder::new()
        .add_source(MapSource::new("test", vec![("a", "${b}"), ("b", "${c}"), ("c", "x")]))
        .max_substitution_nested_depth(0)
        .build()
        .unwrap();

    let error = gestalt.load_configs().unwrap_err();
    assert!(error
        .errors()
        .iter()
        .any(|e| matches!(e, ValidationError::SubstitutionRecursionLimit { .. })));
}

#[test]
fn sibling_substitutions_do_not_count_toward_depth() {
    let gestalt = setup_gestalt(&[
        ("greeting", "${name}-${name}"),
        ("name", "ada"),
        ("cmd", "${a} ${b} ${c} ${d} ${e} ${f}"),
        ("a", "1"),
        ("b", "2"),
        ("c", "3"),
        ("d", "4"),
        ("e", "5"),
        ("f", "6"),
    ]);

    assert_eq!(gestalt.get_config::<String>("greeting").unwrap(), "ada-ada");
    assert_eq!(gestalt.get_config::<String>("cmd").unwrap(), "1 2 3 4 5 6");
}

#[test]
fn temporary_secret_spends_its_reads_and_drops_the_value() {
    let gestalt = GestaltBuilder::new()
        .add_source(MapSource::new("test", vec![("db.password", "hunter2")]))
        .add_secret_rule("password", 2)
        .build()
        .unwrap();
    gestalt.load_configs().unwrap();

    assert_eq!(gestalt.get_config::<String>("db.password").unwrap(), "hunter2");
    assert_eq!(gestalt.get_config::<String>("db.password").unwrap(), "hunter2");

    // The third read finds a spent leaf: the plaintext is gone.
    assert!(gestalt.get_config::<String>("db.password").is_err());
    assert_eq!(
        gestalt
            .get_config_or::<String>("db.password", "fallback".to_owned())
            .unwrap(),
        "fallback"
    );
}

/// A source whose contents can change between reloads.
struct MutableSource {
    entries: Mutex<Vec<(String, String)>>,
}

impl MutableSource {
    fn new(pairs: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(
                pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect(),
            ),
        })
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().unwrap();
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value.to_owned(),
            None => entries.push((key.to_owned(), value.to_owned())),
        }
    }
}

/// Local newtype so `ConfigSource` can be implemented for a shared handle
/// without running afoul of the orphan rule (`Arc` is foreign to this crate).
#[derive(Clone)]
struct MutableSourceHandle(Arc<MutableSource>);

impl ConfigSource for MutableSourceHandle {
    fn name(&self) -> String {
        "mutable test source".to_owned()
    }

    fn id(&self) -> SourceId {
        SourceId::new("mutable-test")
    }

    fn format(&self) -> String {
        gestalt::FORMAT_MAP.to_owned()
    }

    fn has_list(&self) -> bool {
        true
    }

    fn load_list(&self) -> Result<Vec<(String, String)>, GestaltError> {
        Ok(self.0.entries.lock().expect("source entries lock poisoned").clone())
    }
}

#[derive(Default)]
struct CountingListener {
    reloads: AtomicUsize,
}

impl CoreReloadListener for CountingListener {
    fn on_core_reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn reload_publishes_a_new_generation_and_clears_the_cache() {
    let source = MutableSource::new(&[("db.port", "1")]);
    let listener = Arc::new(CountingListener::default());

    let gestalt = GestaltBuilder::new()
        .add_source(MutableSourceHandle(source.clone()))
        .add_listener(listener.clone())
        .build()
        .unwrap();
    gestalt.load_configs().unwrap();
    assert_eq!(gestalt.generation(), 1);
    assert_eq!(listener.reloads.load(Ordering::SeqCst), 1);

    // Prime the cache, then change the backing data and reload.
    assert_eq!(gestalt.get_config::<i64>("db.port").unwrap(), 1);
    source.set("db.port", "2");
    assert_eq!(gestalt.get_config::<i64>("db.port").unwrap(), 1, "cached until reload");

    gestalt.reload_source(&SourceId::new("mutable-test")).unwrap();
    assert_eq!(gestalt.generation(), 2);
    assert_eq!(listener.reloads.load(Ordering::SeqCst), 2);
    assert_eq!(gestalt.get_config::<i64>("db.port").unwrap(), 2);
}

#[test]
fn reloading_an_unknown_source_fails() {
    let gestalt = setup_gestalt(&[("a", "1")]);
    assert!(gestalt.reload_source(&SourceId::new("nope")).is_err());
}

#[test]
fn cached_reads_match_fresh_reads() {
    let pairs = &[("db.port", "5432"), ("db.host", "localhost")];
    let cached = setup_gestalt(pairs);
    let uncached = GestaltBuilder::new()
        .add_source(MapSource::new("test", pairs.iter().copied()))
        .use_cache(false)
        .build()
        .unwrap();
    uncached.load_configs().unwrap();

    for _ in 0..3 {
        assert_eq!(
            cached.get_config::<u16>("db.port").unwrap(),
            uncached.get_config::<u16>("db.port").unwrap()
        );
    }
}

#[test]
fn tags_namespace_cache_entries() {
    let gestalt = setup_gestalt(&[("db.port", "5432")]);
    let plain = gestalt.get_config::<u16>("db.port").unwrap();
    let tagged = gestalt
        .get_config_with_tags::<u16>("db.port", Tags::of([("env", "dev")]))
        .unwrap();
    assert_eq!(plain, tagged);
}

#[test]
fn optional_and_default_reads() {
    let gestalt = setup_gestalt(&[("db.port", "5432"), ("db.bad", "abc")]);

    assert_eq!(gestalt.get_config_optional::<u16>("db.port").unwrap(), Some(5432));
    assert_eq!(gestalt.get_config_optional::<u16>("db.missing").unwrap(), None);
    // Corrupt data still fails the optional read.
    assert!(gestalt.get_config_optional::<u16>("db.bad").is_err());

    assert_eq!(gestalt.get_config_or::<u16>("db.port", 1).unwrap(), 5432);
    assert_eq!(gestalt.get_config_or::<u16>("db.missing", 1).unwrap(), 1);
    assert!(gestalt.get_config_or::<u16>("db.bad", 1).is_err());
}

#[test]
fn environment_source_loads_screaming_case_keys() {
    let expected = std::env::var("PATH").unwrap();
    let gestalt = GestaltBuilder::new()
        .add_source(EnvVarsSource::new())
        .build()
        .unwrap();
    gestalt.load_configs().unwrap();

    assert_eq!(gestalt.get_config::<String>("path").unwrap(), expected);
}

#[test]
fn properties_file_source_loads_end_to_end() {
    let mut file = tempfile::NamedTempFile::with_suffix(".properties").unwrap();
    writeln!(file, "# service settings").unwrap();
    writeln!(file, "service.name=orders").unwrap();
    writeln!(file, "service.workers = 4").unwrap();
    file.flush().unwrap();

    let gestalt = GestaltBuilder::new()
        .add_source(FileSource::new(file.path()))
        .build()
        .unwrap();
    gestalt.load_configs().unwrap();

    assert_eq!(gestalt.get_config::<String>("service.name").unwrap(), "orders");
    assert_eq!(gestalt.get_config::<u8>("service.workers").unwrap(), 4);
}

#[test]
fn missing_file_fails_the_load() {
    let gestalt = GestaltBuilder::new()
        .add_source(FileSource::new("/nonexistent/app.properties"))
        .build()
        .unwrap();
    assert!(matches!(gestalt.load_configs(), Err(GestaltError::Io { .. })));
}

#[test]
fn unknown_format_fails_the_load() {
    let gestalt = GestaltBuilder::new()
        .add_source(FileSource::new("/etc/app/config.yaml"))
        .build()
        .unwrap();
    assert!(matches!(gestalt.load_configs(), Err(GestaltError::SourceLoad { .. })));
}

#[test]
fn bad_path_syntax_fails_a_read() {
    let gestalt = setup_gestalt(&[("a", "1")]);
    for bad in ["a..b", "xs[-1]", "xs[", "a[b]"] {
        assert!(gestalt.get_config::<i64>(bad).is_err(), "{bad} should fail");
    }
}

#[test]
fn file_transform_substitutes_file_contents() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "s3cr3t\n").unwrap();
    file.flush().unwrap();

    let path = file.path().display().to_string();
    let gestalt = setup_gestalt(&[("token", &format!("${{file:{path}}}"))]);
    assert_eq!(gestalt.get_config::<String>("token").unwrap(), "s3cr3t");
}

#[test]
fn custom_transform_plugs_in() {
    struct StaticTransform;

    impl Transform for StaticTransform {
        fn name(&self) -> &'static str {
            "static"
        }

        fn get(&self, key: &str, _ctx: &gestalt::post::PostProcessContext<'_>) -> Option<String> {
            (key == "version").then(|| "1.2.3".to_owned())
        }
    }

    let gestalt = GestaltBuilder::new()
        .add_source(MapSource::new("test", vec![("app.version", "${static:version}")]))
        .add_transform(StaticTransform)
        .build()
        .unwrap();
    gestalt.load_configs().unwrap();

    assert_eq!(gestalt.get_config::<String>("app.version").unwrap(), "1.2.3");
}
