use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

const SAMPLE_CONFIG_TOML: &str = include_str!("fixtures/sample_config.toml");

fn sample_with<F>(mutate: F) -> String
where
	F: FnOnce(&mut toml::Table),
{
	let mut value: Value =
		toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.");
	let root = value.as_table_mut().expect("Sample config must be a table.");

	mutate(root);

	toml::to_string(&value).expect("Failed to render sample config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("mnemo_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load(payload: String) -> mnemo_config::Result<mnemo_config::Config> {
	let path = write_temp_config(payload);
	let result = mnemo_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

#[test]
fn sample_config_loads() {
	let cfg = load(SAMPLE_CONFIG_TOML.to_string()).expect("Sample config must load.");

	assert_eq!(cfg.providers.embedding.dimensions, 8);
	assert_eq!(cfg.retrieval.cascade.max_depth, 3);
	assert!((cfg.retrieval.hybrid.vector_weight - 0.6).abs() < f64::EPSILON);
}

#[test]
fn defaults_fill_omitted_tunables() {
	let payload = sample_with(|root| {
		let capture = root.get_mut("capture").and_then(Value::as_table_mut).unwrap();

		capture.remove("dup_sim_threshold");
		capture.remove("tag_sim_threshold");
	});
	let cfg = load(payload).expect("Config with omitted thresholds must load.");

	assert!((cfg.capture.dup_sim_threshold - 0.85).abs() < f64::EPSILON);
	assert!((cfg.capture.tag_sim_threshold - 0.75).abs() < f64::EPSILON);
}

#[test]
fn rejects_zero_embedding_dimensions() {
	let payload = sample_with(|root| {
		let embedding = root
			.get_mut("providers")
			.and_then(Value::as_table_mut)
			.and_then(|providers| providers.get_mut("embedding"))
			.and_then(Value::as_table_mut)
			.unwrap();

		embedding.insert("dimensions".to_string(), Value::Integer(0));
	});
	let err = load(payload).expect_err("Expected dimensions validation error.");

	assert!(err.to_string().contains("providers.embedding.dimensions"));
}

#[test]
fn rejects_tag_threshold_above_dup_threshold() {
	let payload = sample_with(|root| {
		let capture = root.get_mut("capture").and_then(Value::as_table_mut).unwrap();

		capture.insert("tag_sim_threshold".to_string(), Value::Float(0.95));
	});
	let err = load(payload).expect_err("Expected threshold ordering error.");

	assert!(err.to_string().contains("tag_sim_threshold"));
}

#[test]
fn rejects_out_of_range_min_score() {
	let payload = sample_with(|root| {
		let cascade = root
			.get_mut("retrieval")
			.and_then(Value::as_table_mut)
			.and_then(|retrieval| retrieval.get_mut("cascade"))
			.and_then(Value::as_table_mut)
			.unwrap();

		cascade.insert("min_score".to_string(), Value::Float(1.5));
	});
	let err = load(payload).expect_err("Expected min_score validation error.");

	assert!(err.to_string().contains("retrieval.cascade.min_score"));
}

#[test]
fn rejects_non_positive_halflife() {
	let payload = sample_with(|root| {
		let importance = root.get_mut("importance").and_then(Value::as_table_mut).unwrap();

		importance.insert("decay_halflife_days".to_string(), Value::Float(0.0));
	});
	let err = load(payload).expect_err("Expected halflife validation error.");

	assert!(err.to_string().contains("importance.decay_halflife_days"));
}

#[test]
fn normalizes_trailing_slash_on_api_base() {
	let payload = sample_with(|root| {
		let generation = root
			.get_mut("providers")
			.and_then(Value::as_table_mut)
			.and_then(|providers| providers.get_mut("generation"))
			.and_then(Value::as_table_mut)
			.unwrap();

		generation
			.insert("api_base".to_string(), Value::String("http://localhost:8089/".to_string()));
	});
	let cfg = load(payload).expect("Config with trailing slash must load.");

	assert_eq!(cfg.providers.generation.api_base, "http://localhost:8089");
}
