use std::{fs, path::Path};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    deploy::DeployedContract,
    error::{DeployError, Result},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentRecord {
    address: String,
    transaction_hash: String,
    block_number: Option<u64>,
    chain_id: Option<u64>,
}

/// Merges `contract` into the JSON object at `path`, keyed by contract name.
pub fn write_record(
    path: &Path,
    contract: &DeployedContract,
    chain_id: Option<u64>,
) -> Result<()> {
    let record_error = |reason: String| DeployError::Record {
        path: path.to_path_buf(),
        reason,
    };

    let mut records = if path.exists() {
        let contents = fs::read_to_string(path).map_err(|e| record_error(e.to_string()))?;
        serde_json::from_str::<Map<String, Value>>(&contents)
            .map_err(|e| record_error(e.to_string()))?
    } else {
        Map::new()
    };

    let record = DeploymentRecord {
        address: contract.address(),
        transaction_hash: format!("{:?}", contract.transaction_hash),
        block_number: contract.block_number.map(|number| number.as_u64()),
        chain_id,
    };
    let value = serde_json::to_value(record).map_err(|e| record_error(e.to_string()))?;
    records.insert(contract.name.clone(), value);

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| record_error(e.to_string()))?;
    }
    let contents =
        serde_json::to_string_pretty(&records).map_err(|e| record_error(e.to_string()))?;
    fs::write(path, contents).map_err(|e| record_error(e.to_string()))?;
    log::info!("wrote deployment record to {:?}", path);
    Ok(())
}
