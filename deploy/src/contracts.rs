use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use ethers::{abi::Abi, types::Bytes, utils::hex};
use serde::Deserialize;
use walkdir::WalkDir;

use crate::error::{DeployError, Result};

/// The only contract this tool deploys.
pub const LOCK: &str = "Lock";

const BUILD_INFO_DIR: &str = "build-info";

/// On-disk layout of `artifacts/<source>/<Name>.json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: String,
    source_name: String,
    abi: Abi,
    bytecode: Option<String>,
    #[serde(default)]
    link_references: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

/// Everything needed to build a deployment transaction for one contract.
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub name: String,
    pub source_name: String,
    pub abi: Abi,
    pub bytecode: Bytes,
}

impl ContractArtifact {
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.name)
    }
}

/// Resolves contract factories from a Hardhat `artifacts/` directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `name` is either a bare contract name or `path/To.sol:Name`.
    pub fn contract_factory(&self, name: &str) -> Result<ContractArtifact> {
        let (source, contract) = match name.rsplit_once(':') {
            Some((source, contract)) => (Some(source), contract),
            None => (None, name),
        };

        let mut found = self
            .read_candidates(contract)?
            .into_iter()
            .filter(|(_, artifact)| {
                artifact.contract_name == contract
                    && source.map_or(true, |source| artifact.source_name == source)
            })
            .collect::<Vec<_>>();

        let (path, artifact) = match found.len() {
            0 => return Err(DeployError::ContractNotFound(name.to_string())),
            1 => found.remove(0),
            _ => {
                let mut candidates = found
                    .iter()
                    .map(|(_, a)| format!("{}:{}", a.source_name, a.contract_name))
                    .collect::<Vec<_>>();
                candidates.sort();
                return Err(DeployError::AmbiguousContract {
                    name: name.to_string(),
                    candidates,
                });
            }
        };
        log::debug!("resolved {} from {:?}", name, path);

        if !artifact.link_references.is_empty() {
            let libraries = artifact
                .link_references
                .iter()
                .flat_map(|(source, libs)| libs.keys().map(move |lib| format!("{source}:{lib}")))
                .collect();
            return Err(DeployError::UnlinkedLibraries {
                name: artifact.contract_name,
                libraries,
            });
        }

        let code = artifact.bytecode.as_deref().unwrap_or_default().trim();
        let code = code.strip_prefix("0x").unwrap_or(code);
        if code.is_empty() {
            return Err(DeployError::ContractNotDeployable(artifact.contract_name));
        }
        let bytecode = hex::decode(code).map_err(|e| DeployError::InvalidArtifact {
            path: path.clone(),
            reason: format!("bytecode is not valid hex: {e}"),
        })?;

        Ok(ContractArtifact {
            name: artifact.contract_name,
            source_name: artifact.source_name,
            abi: artifact.abi,
            bytecode: bytecode.into(),
        })
    }

    /// Every `<contract>.json` under the root outside of `build-info/`.
    fn read_candidates(&self, contract: &str) -> Result<Vec<(PathBuf, HardhatArtifact)>> {
        if !self.root.is_dir() {
            log::warn!("artifacts directory {:?} does not exist", self.root);
            return Ok(Vec::new());
        }

        let file_name = format!("{contract}.json");
        let mut candidates = Vec::new();
        let walker = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != BUILD_INFO_DIR);
        for entry in walker {
            let entry = entry.map_err(|e| DeployError::InvalidArtifact {
                path: e.path().map(Path::to_path_buf).unwrap_or_default(),
                reason: e.to_string(),
            })?;
            if !entry.file_type().is_file() || entry.file_name().to_string_lossy() != file_name {
                continue;
            }

            let path = entry.into_path();
            let contents = fs::read_to_string(&path).map_err(|e| DeployError::InvalidArtifact {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            let artifact = serde_json::from_str::<HardhatArtifact>(&contents).map_err(|e| {
                DeployError::InvalidArtifact {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            })?;
            candidates.push((path, artifact));
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_artifact(root: &Path, source: &str, name: &str, bytecode: &str) {
        write_json(
            root,
            source,
            &format!("{name}.json"),
            json!({
                "_format": "hh-sol-artifact-1",
                "contractName": name,
                "sourceName": source,
                "abi": [{"type": "constructor", "inputs": [], "stateMutability": "payable"}],
                "bytecode": bytecode,
                "deployedBytecode": bytecode,
                "linkReferences": {},
                "deployedLinkReferences": {}
            }),
        );
    }

    fn write_json(root: &Path, dir: &str, file: &str, value: serde_json::Value) {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), serde_json::to_string_pretty(&value).unwrap()).unwrap();
    }

    #[test]
    fn resolves_by_bare_name() {
        let tmp = TempDir::new().unwrap();
        write_artifact(tmp.path(), "contracts/Lock.sol", "Lock", "0x6080604052");
        write_json(
            tmp.path(),
            "contracts/Lock.sol",
            "Lock.dbg.json",
            json!({"_format": "hh-sol-dbg-1", "buildInfo": "../../build-info/abc.json"}),
        );
        write_json(tmp.path(), "build-info", "Lock.json", json!({"id": "abc"}));

        let artifact = ArtifactStore::new(tmp.path()).contract_factory(LOCK).unwrap();
        assert_eq!(artifact.name, "Lock");
        assert_eq!(artifact.fully_qualified_name(), "contracts/Lock.sol:Lock");
        assert_eq!(artifact.bytecode.to_vec(), vec![0x60, 0x80, 0x60, 0x40, 0x52]);
        assert!(artifact.abi.constructor.is_some());
    }

    #[test]
    fn missing_contract() {
        let tmp = TempDir::new().unwrap();
        write_artifact(tmp.path(), "contracts/Token.sol", "Token", "0x60");

        let err = ArtifactStore::new(tmp.path()).contract_factory(LOCK).unwrap_err();
        assert!(matches!(err, DeployError::ContractNotFound(name) if name == "Lock"));
    }

    #[test]
    fn missing_artifacts_dir() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path().join("artifacts"));
        assert!(matches!(
            store.contract_factory(LOCK),
            Err(DeployError::ContractNotFound(_))
        ));
    }

    #[test]
    fn duplicate_names_need_qualification() {
        let tmp = TempDir::new().unwrap();
        write_artifact(tmp.path(), "contracts/Lock.sol", "Lock", "0x60");
        write_artifact(tmp.path(), "contracts/legacy/Lock.sol", "Lock", "0x61");
        let store = ArtifactStore::new(tmp.path());

        match store.contract_factory(LOCK).unwrap_err() {
            DeployError::AmbiguousContract { candidates, .. } => assert_eq!(
                candidates,
                vec!["contracts/Lock.sol:Lock", "contracts/legacy/Lock.sol:Lock"]
            ),
            other => panic!("unexpected error {other:?}"),
        }

        let artifact = store
            .contract_factory("contracts/legacy/Lock.sol:Lock")
            .unwrap();
        assert_eq!(artifact.bytecode.to_vec(), vec![0x61]);
    }

    #[test]
    fn interfaces_are_not_deployable() {
        let tmp = TempDir::new().unwrap();
        write_artifact(tmp.path(), "contracts/Lock.sol", "Lock", "0x");

        let err = ArtifactStore::new(tmp.path()).contract_factory(LOCK).unwrap_err();
        assert!(matches!(err, DeployError::ContractNotDeployable(_)));
    }

    #[test]
    fn unlinked_libraries_are_reported() {
        let tmp = TempDir::new().unwrap();
        write_json(
            tmp.path(),
            "contracts/Lock.sol",
            "Lock.json",
            json!({
                "contractName": "Lock",
                "sourceName": "contracts/Lock.sol",
                "abi": [],
                "bytecode": "0x73__$d2a9a8f8e5b3a1c0$__6000",
                "linkReferences": {
                    "contracts/Math.sol": {"Math": [{"length": 20, "start": 1}]}
                }
            }),
        );

        match ArtifactStore::new(tmp.path()).contract_factory(LOCK).unwrap_err() {
            DeployError::UnlinkedLibraries { libraries, .. } => {
                assert_eq!(libraries, vec!["contracts/Math.sol:Math"])
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn malformed_artifact() {
        let tmp = TempDir::new().unwrap();
        write_json(tmp.path(), "contracts/Lock.sol", "Lock.json", json!({"abi": 1}));

        let err = ArtifactStore::new(tmp.path()).contract_factory(LOCK).unwrap_err();
        assert!(matches!(err, DeployError::InvalidArtifact { .. }));
    }
}
