use snowflake::SnowflakeIdBucket;
use std::sync::Mutex;

static ID_GENERATOR: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// Initialize the snowflake ID generator.
///
/// `machine_id`: machine identifier (0-31)
/// `node_id`: node identifier (0-31)
pub fn init(machine_id: i32, node_id: i32) {
    let mut gen = ID_GENERATOR.lock().unwrap();
    *gen = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// Generate a snowflake ID as a string.
pub fn next_id() -> String {
    let mut gen = ID_GENERATOR.lock().unwrap();
    let bucket = gen.get_or_insert_with(|| SnowflakeIdBucket::new(1, 1));
    bucket.get_id().to_string()
}
