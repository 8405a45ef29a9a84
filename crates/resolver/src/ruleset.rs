//! Ruleset files.
//!
//! A ruleset declares targets, what each one reads and the script that
//! brings it up to date:
//!
//! ```text
//! target avg_temp
//!   depends on $temp
//!   update script
//!     expose(avg($temp, 'degrees'))
//!   end script
//!
//! target alarm
//!   depends on avg_temp $limits
//! ```
//!
//! Dependencies starting with `$` are fact tables; the rest name targets.

use crate::token::{scan_directive, strip_comment, TokenKind, TokenValue};
use hashbrown::HashSet;
use verdict_core::{Error, Result};

/// Script text of a target together with where it starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptText {
    pub source: String,
    pub first_line: u32,
    pub text: String,
}

/// One declared target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetDef {
    pub name: String,
    pub depends: Vec<String>,
    pub script: Option<ScriptText>,
    pub source: String,
    pub line: u32,
}

impl TargetDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depends: Vec::new(),
            script: None,
            source: String::new(),
            line: 0,
        }
    }

    /// Adds dependencies; `$name` is a fact table, anything else a target.
    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.depends.extend(deps.iter().map(|d| d.to_string()));
        self
    }

    /// Sets the update script, numbering its lines from 1.
    pub fn script(mut self, text: impl Into<String>) -> Self {
        let source = if self.source.is_empty() {
            self.name.clone()
        } else {
            self.source.clone()
        };
        self.script = Some(ScriptText {
            source,
            first_line: 1,
            text: text.into(),
        });
        self
    }

    /// Fact tables this target reads.
    pub fn facts(&self) -> impl Iterator<Item = &str> {
        self.depends.iter().filter_map(|d| d.strip_prefix('$'))
    }

    /// Targets this target reads.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.depends
            .iter()
            .filter(|d| !d.starts_with('$'))
            .map(String::as_str)
    }
}

/// Parses ruleset text; `source` names it in error messages.
pub fn parse_ruleset(source: &str, text: &str) -> Result<Vec<TargetDef>> {
    let mut defs: Vec<TargetDef> = Vec::new();
    let mut script: Option<ScriptText> = None;

    for (i, line) in text.lines().enumerate() {
        let number = i as u32 + 1;
        if let Some(body) = script.as_mut() {
            let end = matches!(
                scan_directive(line, source, number),
                Ok(Some(ref t)) if t.kind == TokenKind::EndScript
            );
            if end {
                if let (Some(def), Some(done)) = (defs.last_mut(), script.take()) {
                    def.script = Some(done);
                }
            } else {
                body.text.push_str(line);
                body.text.push('\n');
            }
            continue;
        }

        let token = match scan_directive(line, source, number)? {
            Some(token) => token,
            None if strip_comment(line).trim().is_empty() => continue,
            None => return Err(Error::script(source, number, format!("unexpected line '{}'", line.trim()))),
        };
        match (token.kind, token.value) {
            (TokenKind::Target, TokenValue::Str(name)) => {
                if defs.iter().any(|d| d.name == name) {
                    return Err(Error::script(source, number, format!("duplicate target {}", name)));
                }
                let mut def = TargetDef::new(name);
                def.source = source.to_string();
                def.line = number;
                defs.push(def);
            }
            (TokenKind::Depends, TokenValue::StrArray(deps)) => {
                let def = defs
                    .last_mut()
                    .ok_or_else(|| Error::script(source, number, "depends on outside a target"))?;
                def.depends.extend(deps);
            }
            (TokenKind::UpdateScript, _) => {
                match defs.last() {
                    None => return Err(Error::script(source, number, "update script outside a target")),
                    Some(def) if def.script.is_some() => {
                        return Err(Error::script(
                            source,
                            number,
                            format!("target {} already has a script", def.name),
                        ));
                    }
                    Some(_) => {}
                }
                script = Some(ScriptText {
                    source: source.to_string(),
                    first_line: number + 1,
                    text: String::new(),
                });
            }
            (TokenKind::EndScript, _) => {
                return Err(Error::script(source, number, "end script without update script"));
            }
            _ => return Err(Error::script(source, number, "unexpected directive")),
        }
    }

    if script.is_some() {
        let last = text.lines().count() as u32;
        return Err(Error::script(source, last, "missing end script"));
    }
    check_dependencies(&defs)?;
    Ok(defs)
}

/// Rejects dependencies on undeclared targets.
pub fn check_dependencies(defs: &[TargetDef]) -> Result<()> {
    let names: HashSet<&str> = defs.iter().map(|d| d.name.as_str()).collect();
    for def in defs {
        if let Some(missing) = def.targets().find(|t| !names.contains(t)) {
            return Err(Error::not_found("target", missing));
        }
    }
    Ok(())
}
