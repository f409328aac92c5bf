//! トークナイザ: 入力 1 行から [`CommandLine`] を構築する。
//!
//! 空白区切りのみ。クォート、パイプ、変数展開、glob はサポートしない。
//!
//! ## 対応構文
//!
//! - コメント行: 先頭トークンが `#` で始まる行
//! - リダイレクト: `< file`, `> file`（出現位置は任意、後勝ち）
//! - バックグラウンド実行: 行末トークンの `&`
//!
//! 「ディスクリプタなし」は `Ok(None)` で表す（空行、コメント行、引数が残らない行）。
//! 末尾のリダイレクト演算子にターゲットがない行は
//! [`ParseError::MissingRedirectTarget`] になり、呼び出し側で黙って破棄される。

use thiserror::Error;

// ── CommandLine ─────────────────────────────────────────────────────

/// パース済みの 1 行。ディスパッチャに渡されるときは `args` が必ず非空。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// argv。`args[0]` がプログラム名。
    pub args: Vec<String>,
    /// `< file` の指定。
    pub input: Option<String>,
    /// `> file` の指定。
    pub output: Option<String>,
    /// 行末が `&` かつ foreground-only モードでなかった場合に `true`。
    pub background: bool,
}

impl CommandLine {
    /// コマンド名（`args[0]`）。
    pub fn program(&self) -> &str {
        &self.args[0]
    }
}

// ── Error ───────────────────────────────────────────────────────────

/// パース時に発生しうるエラー。
#[derive(Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    /// `<` / `>` の後にターゲットがない。
    #[error("syntax error: missing redirect target")]
    MissingRedirectTarget,
    /// 引数の数が上限を超えた。
    #[error("too many arguments (limit {0})")]
    TooManyArguments(usize),
}

// ── parse ───────────────────────────────────────────────────────────

/// 1 行をパースする。
///
/// `foreground_only` が `true` のとき、行末の `&` は取り除かれるが
/// バックグラウンド指定としては扱われない。
pub fn parse(
    line: &str,
    foreground_only: bool,
    max_args: usize,
) -> Result<Option<CommandLine>, ParseError> {
    let mut tokens = line.split_whitespace().peekable();

    match tokens.peek() {
        None => return Ok(None),
        Some(first) if first.starts_with('#') => return Ok(None),
        Some(_) => {}
    }

    let mut cmd = CommandLine {
        args: Vec::new(),
        input: None,
        output: None,
        background: false,
    };
    let mut trailing_amp = false;

    while let Some(token) = tokens.next() {
        match token {
            "<" => {
                let target = tokens.next().ok_or(ParseError::MissingRedirectTarget)?;
                cmd.input = Some(target.to_string());
            }
            ">" => {
                let target = tokens.next().ok_or(ParseError::MissingRedirectTarget)?;
                cmd.output = Some(target.to_string());
            }
            "&" if tokens.peek().is_none() => trailing_amp = true,
            _ => cmd.args.push(token.to_string()),
        }
    }

    if cmd.args.len() > max_args {
        return Err(ParseError::TooManyArguments(max_args));
    }
    if cmd.args.is_empty() {
        return Ok(None);
    }

    cmd.background = trailing_amp && !foreground_only;
    Ok(Some(cmd))
}
