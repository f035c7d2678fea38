#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const FULL: &str = "20220401102430";
pub const INCREMENTAL: &str = "20220402102430";
pub const LOCAL: &str = "20220403102430";
pub const DELETED: &str = "20220301000000";
pub const FAILED: &str = "20220302000000";

/// A history file as the backup engine writes it: oldest entries last,
/// quoted timestamps, every key lower-case.
pub fn history_yaml(local_backup_dir: &Path) -> String {
    format!(
        r#"backupconfigs:
- backupdir: ""
  backupversion: 1.30.5
  compressed: true
  compressiontype: gzip
  databasename: demo
  databaseversion: 6.25.3 build commit:367edc6b
  segmentcount: 2
  incremental: true
  leafpartitiondata: true
  plugin: gpbackup_s3_plugin
  pluginversion: 1.10.1
  restoreplan:
  - timestamp: "{FULL}"
    tablefqn:
    - public.orders
  - timestamp: "{INCREMENTAL}"
    tablefqn:
    - public.orders
  timestamp: "{INCREMENTAL}"
  endtime: "{INCREMENTAL_END}"
  datedeleted: ""
  status: Success
- backupdir: "{local}"
  backupversion: 1.30.5
  databasename: demo
  segmentcount: 2
  includeschemafiltered: true
  includeschemas:
  - sales
  plugin: ""
  restoreplan:
  - timestamp: "{LOCAL}"
    tablefqn:
    - sales.items
  timestamp: "{LOCAL}"
  endtime: "20220403103000"
  datedeleted: ""
  status: Success
- backupdir: ""
  backupversion: 1.30.5
  compressed: true
  compressiontype: gzip
  databasename: demo
  segmentcount: 2
  plugin: gpbackup_s3_plugin
  pluginversion: 1.10.1
  restoreplan:
  - timestamp: "{FULL}"
    tablefqn:
    - public.orders
  timestamp: "{FULL}"
  endtime: "20220401112431"
  datedeleted: ""
  status: Success
- backupdir: ""
  databasename: demo
  plugin: gpbackup_s3_plugin
  restoreplan:
  - timestamp: "{DELETED}"
    tablefqn:
    - public.orders
  timestamp: "{DELETED}"
  endtime: "20220301001000"
  datedeleted: "20220305000000"
  status: Success
- backupdir: ""
  databasename: demo
  plugin: gpbackup_s3_plugin
  restoreplan: []
  timestamp: "{FAILED}"
  endtime: "20220302000100"
  datedeleted: ""
  status: Failure
"#,
        local = local_backup_dir.display(),
        INCREMENTAL_END = "20220402102530",
    )
}

pub fn write_history(dir: &Path) -> PathBuf {
    let path = dir.join("gpbackup_history.yaml");
    fs::write(&path, history_yaml(&dir.join("local_backups"))).unwrap();
    path
}

/// Shell plugin that logs its arguments next to itself and prints a report
/// for `restore_data`.
pub fn write_plugin(dir: &Path) -> PathBuf {
    let script = dir.join("fake_plugin.sh");
    fs::write(
        &script,
        r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/plugin_calls.log"
case "$1" in
  restore_data) echo "Backup Report from $3" ;;
esac
exit 0
"#,
    )
    .unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    }

    let config = dir.join("s3_config.yaml");
    fs::write(
        &config,
        format!(
            "executablepath: {}\noptions:\n  bucket: backups\n  folder: /demo\n",
            script.display()
        ),
    )
    .unwrap();
    config
}

pub fn plugin_calls(dir: &Path) -> String {
    fs::read_to_string(dir.join("plugin_calls.log")).unwrap_or_default()
}
