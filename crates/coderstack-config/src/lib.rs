//! coderstack の設定ファイル (coder.kdl) の探索

pub mod error;

pub use error::*;

use std::path::{Path, PathBuf};

/// 設定ファイルを直接指定する環境変数
pub const CONFIG_PATH_ENV: &str = "CODERSTACK_CONFIG";

const CANDIDATES: [&str; 3] = ["coder.local.kdl", "coder.kdl", ".coder.kdl"];
const PROJECT_DIR: &str = ".coderstack";
const GLOBAL_FILE: &str = "coder.kdl";

/// グローバル設定ディレクトリ (`~/.config/coderstack`)
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("coderstack");
    Ok(config_dir)
}

/// 設定ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. `explicit` (`--config` フラグ)
/// 2. 環境変数 `CODERSTACK_CONFIG`
/// 3. カレントディレクトリ: coder.local.kdl, coder.kdl, .coder.kdl
/// 4. ./.coderstack/ ディレクトリ内: 同様の順序
/// 5. ~/.config/coderstack/coder.kdl (グローバル設定)
///
/// 1 と 2 で直接指定されたパスは存在しなければエラー
pub fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    // 1. フラグで直接指定
    if let Some(path) = explicit {
        return existing(path.to_path_buf());
    }

    // 2. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV)
        && !config_path.is_empty()
    {
        return existing(PathBuf::from(config_path));
    }

    // 3. カレントディレクトリで検索
    let current_dir = std::env::current_dir()?;
    if let Some(path) = find_in(&current_dir) {
        return Ok(path);
    }

    // 4. ./.coderstack/ ディレクトリで検索
    let project_dir = current_dir.join(PROJECT_DIR);
    if project_dir.is_dir()
        && let Some(path) = find_in(&project_dir)
    {
        return Ok(path);
    }

    // 5. グローバル設定ファイル
    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join(GLOBAL_FILE);
        if global_config.exists() {
            tracing::debug!(path = %global_config.display(), "グローバル設定を使用");
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

fn existing(path: PathBuf) -> Result<PathBuf> {
    if path.exists() {
        Ok(path)
    } else {
        Err(ConfigError::ExplicitPathNotFound(path))
    }
}
