//! 設定ファイル探索のエラー型

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error(
        "設定ファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: coder.local.kdl, coder.kdl, .coder.kdl\n\
        - ./.coderstack/ ディレクトリ\n\
        - ~/.config/coderstack/coder.kdl\n\
        または --config / CODERSTACK_CONFIG 環境変数で直接指定できます"
    )]
    ConfigFileNotFound,

    #[error("指定された設定ファイルが存在しません: {0}")]
    ExplicitPathNotFound(std::path::PathBuf),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
