//! Raw workflow entries as written in `workflow.yaml`, their merge rules,
//! and conversion into validated [`Plugin`]s.

use serde::{Deserialize, Serialize};

use crate::action::parse_action;
use crate::error::{Error, Result};
use crate::filter::parse_optional_filter;
use crate::sort::parse_sort;

use super::key::PluginKey;
use super::{
    DokiPlugin, DokiSource, Lane, Plugin, PluginAction, PluginBase, TikiPlugin, ViewMode,
    MAX_PLUGIN_ACTIONS,
};

/// Top level of a workflow file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowFile {
    /// Entries stay untyped so one bad entry does not reject the file.
    #[serde(default)]
    pub plugins: Vec<serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    pub name: String,
    /// `tiki` or `doki`; inferred from the fields present when empty.
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub modifier: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub foreground: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub background: String,

    // tiki
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filter: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sort: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub view: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lanes: Vec<LaneConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionConfig>,

    // doki
    #[serde(skip_serializing_if = "String::is_empty")]
    pub fetcher: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    pub name: String,
    pub columns: Option<usize>,
    pub filter: String,
    pub action: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    pub key: String,
    pub label: String,
    pub action: String,
}

fn pick(base: &str, over: &str) -> String {
    if over.trim().is_empty() {
        base.to_string()
    } else {
        over.to_string()
    }
}

impl PluginConfig {
    fn has_doki_fields(&self) -> bool {
        !(self.fetcher.is_empty() && self.text.is_empty() && self.url.is_empty())
    }

    fn has_tiki_fields(&self) -> bool {
        !(self.filter.is_empty()
            && self.sort.is_empty()
            && self.view.is_empty()
            && self.lanes.is_empty()
            && self.actions.is_empty())
    }

    /// Layer `over` on top of `self`.
    ///
    /// Non-empty fields of `over` replace ours. Key and modifier move as a
    /// pair: if the override sets either, both come from the override.
    pub fn merged_with(&self, over: &PluginConfig) -> PluginConfig {
        let (key, modifier) = if over.key.trim().is_empty() && over.modifier.trim().is_empty() {
            (self.key.clone(), self.modifier.clone())
        } else {
            (over.key.clone(), over.modifier.clone())
        };
        PluginConfig {
            name: pick(&self.name, &over.name),
            kind: pick(&self.kind, &over.kind),
            key,
            modifier,
            foreground: pick(&self.foreground, &over.foreground),
            background: pick(&self.background, &over.background),
            filter: pick(&self.filter, &over.filter),
            sort: pick(&self.sort, &over.sort),
            view: pick(&self.view, &over.view),
            lanes: if over.lanes.is_empty() {
                self.lanes.clone()
            } else {
                over.lanes.clone()
            },
            actions: if over.actions.is_empty() {
                self.actions.clone()
            } else {
                over.actions.clone()
            },
            fetcher: pick(&self.fetcher, &over.fetcher),
            text: pick(&self.text, &over.text),
            url: pick(&self.url, &over.url),
        }
    }

    fn invalid(&self, message: impl Into<String>) -> Error {
        Error::InvalidPlugin {
            name: self.name.clone(),
            message: message.into(),
        }
    }

    /// Validate and compile this entry.
    pub fn build(&self, config_index: usize, max_points: i32) -> Result<Plugin> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(self.invalid("name is required"));
        }
        if self.key.trim().is_empty() {
            return Err(self.invalid("key is required"));
        }
        let modifier = Some(self.modifier.as_str());
        let key = PluginKey::parse_with_modifier(&self.key, modifier)
            .map_err(|message| self.invalid(message))?;

        let base = PluginBase {
            name: name.to_string(),
            key,
            foreground: non_empty(&self.foreground),
            background: non_empty(&self.background),
            config_index,
        };

        let kind = match self.kind.trim().to_ascii_lowercase().as_str() {
            "" if self.has_doki_fields() => "doki".to_string(),
            "" => "tiki".to_string(),
            other => other.to_string(),
        };
        match kind.as_str() {
            "tiki" => self.build_tiki(base, max_points).map(Plugin::Tiki),
            "doki" => self.build_doki(base).map(Plugin::Doki),
            other => Err(self.invalid(format!("unknown plugin type '{other}'"))),
        }
    }

    fn build_tiki(&self, base: PluginBase, max_points: i32) -> Result<TikiPlugin> {
        if self.has_doki_fields() {
            return Err(self.invalid("tiki plugins cannot set fetcher, text or url"));
        }

        let filter = parse_optional_filter(&self.filter)
            .map_err(|err| self.invalid(format!("filter: {err}")))?;
        let sort = parse_sort(&self.sort).map_err(|err| self.invalid(format!("sort: {err}")))?;
        let view_mode = if self.view.trim().is_empty() {
            ViewMode::default()
        } else {
            ViewMode::parse(&self.view)
                .ok_or_else(|| self.invalid(format!("unknown view '{}'", self.view)))?
        };

        let mut lanes = Vec::with_capacity(self.lanes.len());
        for (index, lane) in self.lanes.iter().enumerate() {
            let lane_name = lane.name.trim();
            if lane_name.is_empty() {
                return Err(self.invalid(format!("lane {} has no name", index + 1)));
            }
            let columns = lane.columns.unwrap_or(1);
            if columns == 0 {
                return Err(self.invalid(format!("lane '{lane_name}': columns must be >= 1")));
            }
            let filter = parse_optional_filter(&lane.filter)
                .map_err(|err| self.invalid(format!("lane '{lane_name}' filter: {err}")))?;
            let action = if lane.action.trim().is_empty() {
                None
            } else {
                Some(
                    parse_action(&lane.action, max_points)
                        .map_err(|err| self.invalid(format!("lane '{lane_name}' action: {err}")))?,
                )
            };
            lanes.push(Lane {
                name: lane_name.to_string(),
                columns,
                filter,
                action,
            });
        }

        if self.actions.len() > MAX_PLUGIN_ACTIONS {
            return Err(self.invalid(format!(
                "at most {MAX_PLUGIN_ACTIONS} actions are allowed, found {}",
                self.actions.len()
            )));
        }
        let mut actions: Vec<PluginAction> = Vec::with_capacity(self.actions.len());
        for entry in &self.actions {
            let mut chars = entry.key.trim().chars();
            let key = match (chars.next(), chars.next()) {
                (Some(ch), None) => ch,
                _ => {
                    return Err(self.invalid(format!(
                        "action key '{}' must be a single character",
                        entry.key
                    )))
                }
            };
            if actions.iter().any(|existing| existing.key == key) {
                return Err(self.invalid(format!("duplicate action key '{key}'")));
            }
            let action = parse_action(&entry.action, max_points)
                .map_err(|err| self.invalid(format!("action '{key}': {err}")))?;
            if action.is_empty() {
                return Err(self.invalid(format!("action '{key}' is empty")));
            }
            actions.push(PluginAction {
                key,
                label: entry.label.trim().to_string(),
                action,
            });
        }

        Ok(TikiPlugin {
            base,
            filter,
            sort,
            view_mode,
            lanes,
            actions,
        })
    }

    fn build_doki(&self, base: PluginBase) -> Result<DokiPlugin> {
        if self.has_tiki_fields() {
            return Err(self.invalid(
                "doki plugins cannot set filter, sort, view, lanes or actions",
            ));
        }
        let fetcher = if self.fetcher.trim().is_empty() {
            if self.url.trim().is_empty() {
                "internal"
            } else {
                "file"
            }
        } else {
            self.fetcher.trim()
        };
        let source = match fetcher {
            "internal" => {
                if !self.url.trim().is_empty() {
                    return Err(self.invalid("internal doki plugins use text, not url"));
                }
                DokiSource::Internal(self.text.clone())
            }
            "file" => {
                if self.url.trim().is_empty() {
                    return Err(self.invalid("file doki plugins need a url"));
                }
                if !self.text.trim().is_empty() {
                    return Err(self.invalid("file doki plugins use url, not text"));
                }
                DokiSource::File(self.url.trim().to_string())
            }
            other => return Err(self.invalid(format!("unknown fetcher '{other}'"))),
        };
        Ok(DokiPlugin { base, source })
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::DEFAULT_MAX_POINTS;

    fn config(yaml: &str) -> PluginConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn build_err(yaml: &str) -> String {
        config(yaml).build(0, DEFAULT_MAX_POINTS).unwrap_err().to_string()
    }

    #[test]
    fn builds_tiki_with_lanes_and_actions() {
        let plugin = config(
            r#"
name: Board
key: F1
filter: status != done
sort: priority, updated_at desc
view: expanded
lanes:
  - name: Todo
    filter: status = todo
    action: status=todo
  - name: Doing
    columns: 2
    filter: status = in_progress
actions:
  - key: b
    label: Mark bug
    action: type=bug
"#,
        )
        .build(3, DEFAULT_MAX_POINTS)
        .unwrap();

        let Plugin::Tiki(tiki) = plugin else {
            panic!("expected tiki plugin");
        };
        assert_eq!(tiki.base.name, "Board");
        assert_eq!(tiki.base.config_index, 3);
        assert!(tiki.filter.is_some());
        assert_eq!(tiki.sort.len(), 2);
        assert_eq!(tiki.view_mode, ViewMode::Expanded);
        assert_eq!(tiki.lanes.len(), 2);
        assert_eq!(tiki.lanes[1].columns, 2);
        assert!(tiki.lanes[1].action.is_none());
        assert_eq!(tiki.actions[0].key, 'b');
    }

    #[test]
    fn infers_doki_from_fields() {
        let plugin = config("name: Help\nkey: '?'\ntext: '# Help'\n")
            .build(0, DEFAULT_MAX_POINTS)
            .unwrap();
        let Plugin::Doki(doki) = plugin else {
            panic!("expected doki plugin");
        };
        assert_eq!(doki.source, DokiSource::Internal("# Help".to_string()));

        let plugin = config("name: Docs\nkey: D\nurl: docs/index.md\n")
            .build(0, DEFAULT_MAX_POINTS)
            .unwrap();
        assert!(matches!(plugin, Plugin::Doki(DokiPlugin { source: DokiSource::File(_), .. })));
    }

    #[test]
    fn rejects_cross_type_fields() {
        assert!(build_err("name: X\nkey: x\ntype: tiki\nurl: a.md\n").contains("tiki plugins"));
        assert!(build_err("name: X\nkey: x\ntext: hi\nfilter: status = done\n")
            .contains("doki plugins"));
    }

    #[test]
    fn rejects_bad_actions() {
        let duplicate = "name: X\nkey: x\nactions:\n  - {key: a, action: status=done}\n  - {key: a, action: status=todo}\n";
        assert!(build_err(duplicate).contains("duplicate action key"));

        let tags_assign = "name: X\nkey: x\nactions:\n  - {key: a, action: 'tags=[x]'}\n";
        assert!(build_err(tags_assign).contains("action 'a'"));

        let priority = "name: X\nkey: x\nactions:\n  - {key: a, action: priority=9}\n";
        assert!(build_err(priority).contains("action 'a'"));

        let points = "name: X\nkey: x\nlanes:\n  - {name: L, action: points=99}\n";
        assert!(build_err(points).contains("lane 'L' action"));

        let mut many = String::from("name: X\nkey: x\nactions:\n");
        for ch in "abcdefghijk".chars() {
            many.push_str(&format!("  - {{key: {ch}, action: status=done}}\n"));
        }
        assert!(build_err(&many).contains("at most 10"));
    }

    #[test]
    fn rejects_missing_name_key_and_bad_filter() {
        assert!(build_err("key: x\n").contains("name is required"));
        assert!(build_err("name: X\n").contains("key is required"));
        assert!(build_err("name: X\nkey: x\nfilter: 'status ='\n").contains("filter"));
        assert!(build_err("name: X\nkey: x\nview: wide\n").contains("unknown view"));
    }

    #[test]
    fn override_replaces_only_non_empty_fields() {
        let base = config("name: Board\nkey: k\nmodifier: ctrl\nforeground: red\nfilter: status = todo\n");
        let over = config("name: Board\nforeground: blue\n");
        let merged = base.merged_with(&over);
        assert_eq!(merged.foreground, "blue");
        assert_eq!(merged.filter, "status = todo");
        assert_eq!(merged.key, "k");
        assert_eq!(merged.modifier, "ctrl");
    }

    #[test]
    fn key_and_modifier_override_together() {
        let base = config("name: Board\nkey: k\nmodifier: ctrl\n");
        let over = config("name: Board\nkey: F2\n");
        let merged = base.merged_with(&over);
        assert_eq!(merged.key, "F2");
        assert_eq!(merged.modifier, "");

        let Plugin::Tiki(tiki) = merged.build(0, DEFAULT_MAX_POINTS).unwrap() else {
            panic!("expected tiki plugin");
        };
        assert_eq!(tiki.base.key, PluginKey::function(2));
    }
}
