//! On-disk config store
//!
//! The files are the only state: listing scans the directory, writes compare
//! against the current bytes first so re-rendering an unchanged document is
//! a no-op.

use crate::allocator::ConfigSource;
use crate::types::{ChangeAction, PeerRef, Report};
use crate::{Config, Error, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::{debug, info};

/// Filesystem view of the VPN and peer config files
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config: Config,
}

impl ConfigStore {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Names of every `<prefix><name>.conf` file in the base directory, sorted
    pub fn list_vpns(&self) -> Result<Vec<String>> {
        let mut vpns: Vec<String> = self
            .conf_stems(&self.config.wireguard_dir)?
            .into_iter()
            .filter(|name| !name.is_empty())
            .collect();
        vpns.sort();
        Ok(vpns)
    }

    /// Every `<prefix><vpn>-<peer>.conf` file in the peers directory, sorted
    pub fn list_peers(&self) -> Result<Vec<PeerRef>> {
        let mut peers: Vec<PeerRef> = self
            .conf_stems(&self.config.peers_dir())?
            .into_iter()
            .filter_map(|stem| {
                let (vpn, peer) = stem.split_once('-')?;
                (!vpn.is_empty() && !peer.is_empty()).then(|| PeerRef {
                    vpn: vpn.to_string(),
                    peer: peer.to_string(),
                })
            })
            .collect();
        peers.sort();
        Ok(peers)
    }

    /// File names in `dir` with the interface prefix and `.conf` stripped
    fn conf_stems(&self, dir: &Path) -> Result<Vec<String>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut stems = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                debug!("Skipping non UTF-8 file name {:?}", name);
                continue;
            };
            if let Some(stem) = name
                .strip_prefix(self.config.interface_prefix.as_str())
                .and_then(|rest| rest.strip_suffix(".conf"))
            {
                stems.push(stem.to_string());
            }
        }
        Ok(stems)
    }

    /// Read a file, mapping absence to `None`
    pub fn read_optional(&self, path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Create a directory (and parents) unless it exists
    pub fn ensure_dir(&self, path: &Path, report: &mut Report) -> Result<()> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => return Ok(()),
            Ok(_) => return Err(Error::NotADirectory(path.to_path_buf())),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.create_dir_all(path)?;
        info!("Created directory {}", path.display());
        report.add_change(ChangeAction::Created, path);
        Ok(())
    }

    /// Write `data` unless the file already holds exactly those bytes
    ///
    /// Returns the action taken, `None` when the file was left untouched.
    pub fn write_if_changed(
        &self,
        path: &Path,
        data: &[u8],
        report: &mut Report,
    ) -> Result<Option<ChangeAction>> {
        let action = match fs::read(path) {
            Ok(existing) if existing == data => {
                debug!("{} is up to date", path.display());
                return Ok(None);
            }
            Ok(_) => ChangeAction::Updated,
            Err(e) if e.kind() == ErrorKind::NotFound => ChangeAction::Created,
            Err(e) => return Err(e.into()),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.ensure_dir(parent, report)?;
        }
        self.write_file(path, data)?;

        info!("{} {}", action, path.display());
        report.add_change(action, path);
        Ok(Some(action))
    }

    /// Delete a file and record it
    pub fn remove_file(&self, path: &Path, report: &mut Report) -> Result<()> {
        fs::remove_file(path)?;
        info!("deleted {}", path.display());
        report.add_change(ChangeAction::Deleted, path);
        Ok(())
    }

    #[cfg(unix)]
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new()
            .recursive(true)
            .mode(self.config.dir_mode)
            .create(path)?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(self.config.file_mode);
        }
        let mut file = options.open(path)?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    }
}

impl ConfigSource for ConfigStore {
    fn vpn_names(&self) -> Result<Vec<String>> {
        self.list_vpns()
    }

    fn read_vpn_config(&self, vpn: &str) -> Result<String> {
        Ok(fs::read_to_string(self.config.vpn_config_path(vpn))?)
    }
}
