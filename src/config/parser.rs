//! Layered config loader.
//!
//! Many YAML documents merge into one [`Config`]. Each document is parsed
//! strictly (unknown keys reject) and merged under the restriction governing
//! its logical path. The first error aborts the current file; state merged
//! from earlier files is kept.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use tracing::debug;

use crate::config::model::{Channel, Config, Usergroup};
use crate::config::restrictions::{matches_regex_list, resolve, Restriction};

/// Accumulates config documents into one merged [`Config`].
#[derive(Debug, Default)]
pub struct Parser {
    pub config: Config,
    parsed: HashSet<PathBuf>,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one YAML document and merge it under the restriction governing
    /// `logical_path`.
    pub fn parse(&mut self, content: &[u8], logical_path: &str) -> Result<()> {
        let incoming: Config =
            serde_yaml::from_slice(content).context("failed to parse yaml")?;

        let merged = merge_restrictions(
            std::mem::take(&mut self.config.restrictions),
            incoming.restrictions,
        )
        .context("couldn't load restrictions")?;
        self.config.restrictions = merged;

        let r = resolve(&self.config.restrictions, logical_path).clone();

        merge_users(&mut self.config.users, incoming.users, &r)
            .context("couldn't merge users")?;

        self.config.channels = merge_channels(
            std::mem::take(&mut self.config.channels),
            incoming.channels,
            &r,
        )
        .context("couldn't merge channels")?;

        self.config.usergroups = merge_usergroups(
            std::mem::take(&mut self.config.usergroups),
            incoming.usergroups,
            &r,
        )
        .context("couldn't merge usergroups")?;

        if !incoming.channel_template.is_empty() {
            if !r.template {
                bail!("can't set channel template in {:?}", r.path);
            }
            if !self.config.channel_template.is_empty() {
                bail!("can't overwrite existing channel template");
            }
            self.config.channel_template = incoming.channel_template;
        }

        Ok(())
    }

    /// Parse a file on disk. The file's logical path is its physical path
    /// relative to `base_dir`. Already-parsed paths are skipped.
    pub fn parse_file(&mut self, path: &Path, base_dir: &Path) -> Result<()> {
        if !self.parsed.insert(path.to_path_buf()) {
            return Ok(());
        }
        let logical = path
            .strip_prefix(base_dir)
            .map_err(|_| anyhow!("{:?} is not a prefix of {:?}", base_dir, path))?
            .to_string_lossy()
            .into_owned();
        debug!(path = %path.display(), logical, "parsing config file");
        let content =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        self.parse(&content, &logical)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Parse every `*.yaml` beneath `base_dir`, in lexicographic order.
    pub fn parse_dir(&mut self, base_dir: &Path) -> Result<()> {
        let pattern = base_dir.join("**").join("*.yaml");
        let mut matches = glob::glob(&pattern.to_string_lossy())
            .context("failed to find config files")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to walk config directory")?;
        matches.sort();
        for f in &matches {
            self.parse_file(f, base_dir)?;
        }
        Ok(())
    }
}

fn merge_restrictions(
    existing: Vec<Restriction>,
    incoming: Vec<Restriction>,
) -> Result<Vec<Restriction>> {
    if !existing.is_empty() && !incoming.is_empty() {
        bail!("restrictions can only be defined once");
    }
    if !existing.is_empty() {
        return Ok(existing);
    }
    let mut ret = incoming;
    for r in &mut ret {
        r.compile()?;
    }
    Ok(ret)
}

fn merge_users(
    target: &mut std::collections::HashMap<String, String>,
    source: std::collections::HashMap<String, String>,
    r: &Restriction,
) -> Result<()> {
    if !r.users && !source.is_empty() {
        bail!("cannot define users in {:?}", r.path);
    }
    let mut entries: Vec<_> = source.into_iter().collect();
    entries.sort();
    for (name, id) in entries {
        if target.contains_key(&name) {
            bail!("cannot overwrite users (duplicate user {name})");
        }
        if id.len() != 9 {
            bail!("{name}: {id:?} is not a valid user ID");
        }
        target.insert(name, id);
    }
    Ok(())
}

fn merge_channels(a: Vec<Channel>, b: Vec<Channel>, r: &Restriction) -> Result<Vec<Channel>> {
    let mut names: HashSet<String> = HashSet::new();
    let mut ids: HashSet<String> = HashSet::new();
    for v in &a {
        names.insert(v.name.clone());
        if !v.id.is_empty() {
            ids.insert(v.id.clone());
        }
    }
    for v in &b {
        if v.name.is_empty() {
            bail!("channels must have names");
        }
        if !matches_regex_list(&v.name, &r.channels) {
            bail!("cannot define channel {:?} in {:?}", v.name, r.path);
        }
        if !names.insert(v.name.clone()) {
            bail!("cannot overwrite channel definitions (duplicate channel name {})", v.name);
        }
        if !v.id.is_empty() && !ids.insert(v.id.clone()) {
            bail!("cannot overwrite channel definitions (duplicate channel ID {})", v.id);
        }
    }

    let mut merged = a;
    merged.extend(b);
    Ok(merged)
}

fn merge_usergroups(
    a: Vec<Usergroup>,
    b: Vec<Usergroup>,
    r: &Restriction,
) -> Result<Vec<Usergroup>> {
    let mut names: HashSet<String> = a.iter().map(|v| v.name.clone()).collect();
    for v in &b {
        if v.name.is_empty() {
            bail!("usergroups must have names");
        }
        if !matches_regex_list(&v.name, &r.usergroups) {
            bail!("cannot define usergroup {:?} in {:?}", v.name, r.path);
        }
        if !v.external {
            if v.long_name.is_empty() {
                bail!("usergroup {} must have a long name", v.name);
            }
            if v.description.is_empty() {
                bail!("usergroup {} must have a description", v.name);
            }
            if v.members.is_empty() {
                bail!("usergroup {} must have at least one member", v.name);
            }
        }
        if !names.insert(v.name.clone()) {
            bail!("cannot overwrite usergroup definitions (duplicate usergroup {})", v.name);
        }
    }

    let mut merged = a;
    merged.extend(b);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::restrictions::default_restriction;
    use std::collections::HashMap;

    fn users(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn channel(name: &str, id: &str) -> Channel {
        Channel {
            name: name.to_string(),
            id: id.to_string(),
            ..Channel::default()
        }
    }

    fn group(name: &str) -> Usergroup {
        Usergroup {
            name: name.to_string(),
            long_name: format!("{name} long"),
            description: format!("{name} description"),
            members: vec!["somebody".to_string()],
            ..Usergroup::default()
        }
    }

    fn no_users_restriction() -> Restriction {
        Restriction {
            path: "locked.yaml".to_string(),
            users: false,
            ..Restriction::default()
        }
    }

    #[test]
    fn merge_users_into_empty_map() {
        let mut target = HashMap::new();
        merge_users(
            &mut target,
            users(&[("alice", "U00000001"), ("bob", "U00000002")]),
            default_restriction(),
        )
        .expect("merge");
        assert_eq!(target, users(&[("alice", "U00000001"), ("bob", "U00000002")]));
    }

    #[test]
    fn merge_users_disjoint_maps() {
        let mut target = users(&[("alice", "U00000001")]);
        merge_users(
            &mut target,
            users(&[("bob", "U00000002")]),
            default_restriction(),
        )
        .expect("merge");
        assert_eq!(target.len(), 2);
    }

    #[test]
    fn merge_users_duplicate_is_an_error() {
        let mut target = users(&[("alice", "U00000001")]);
        let err = merge_users(
            &mut target,
            users(&[("alice", "U00000009")]),
            default_restriction(),
        )
        .expect_err("duplicate");
        assert!(err.to_string().contains("duplicate user alice"), "{err}");
    }

    #[test]
    fn merge_users_without_permission_is_an_error() {
        let mut target = HashMap::new();
        let err = merge_users(
            &mut target,
            users(&[("alice", "U00000001")]),
            &no_users_restriction(),
        )
        .expect_err("forbidden");
        assert!(err.to_string().contains("cannot define users"), "{err}");
    }

    #[test]
    fn merge_users_empty_is_fine_regardless_of_permissions() {
        let mut target = users(&[("alice", "U00000001")]);
        merge_users(&mut target, HashMap::new(), &no_users_restriction()).expect("no-op");
        assert_eq!(target.len(), 1);
    }

    #[test]
    fn merge_users_rejects_malformed_ids() {
        let mut target = HashMap::new();
        let err = merge_users(
            &mut target,
            users(&[("alice", "wat")]),
            default_restriction(),
        )
        .expect_err("bad id");
        assert!(err.to_string().contains("not a valid user ID"), "{err}");
    }

    #[test]
    fn merge_channels_appends_in_order() {
        let merged = merge_channels(
            vec![channel("sig-testing", "C00000001")],
            vec![channel("sig-node", ""), channel("sig-arch", "")],
            default_restriction(),
        )
        .expect("merge");
        let names: Vec<&str> = merged.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["sig-testing", "sig-node", "sig-arch"]);
    }

    #[test]
    fn merge_channels_requires_names() {
        let err = merge_channels(vec![], vec![channel("", "")], default_restriction())
            .expect_err("unnamed");
        assert!(err.to_string().contains("channels must have names"), "{err}");
    }

    #[test]
    fn merge_channels_enforces_patterns() {
        let mut r = Restriction {
            path: "sig.yaml".to_string(),
            channel_patterns: vec!["sig-.*".to_string()],
            ..Restriction::default()
        };
        r.compile().expect("compile");
        merge_channels(vec![], vec![channel("sig-node", "")], &r).expect("permitted");
        let err = merge_channels(vec![], vec![channel("ug-node", "")], &r).expect_err("denied");
        assert!(err.to_string().contains("cannot define channel"), "{err}");
    }

    #[test]
    fn merge_channels_rejects_duplicate_names_and_ids() {
        let existing = vec![channel("sig-testing", "C00000001")];
        let err = merge_channels(
            existing.clone(),
            vec![channel("sig-testing", "")],
            default_restriction(),
        )
        .expect_err("dup name");
        assert!(err.to_string().contains("duplicate channel name"), "{err}");

        let err = merge_channels(
            existing.clone(),
            vec![channel("sig-other", "C00000001")],
            default_restriction(),
        )
        .expect_err("dup id");
        assert!(err.to_string().contains("duplicate channel ID"), "{err}");

        // Collisions within a single incoming document are caught too.
        let err = merge_channels(
            vec![],
            vec![channel("sig-twice", ""), channel("sig-twice", "")],
            default_restriction(),
        )
        .expect_err("dup within file");
        assert!(err.to_string().contains("duplicate channel name"), "{err}");
    }

    #[test]
    fn merge_usergroups_requires_full_definitions() {
        let incomplete = Usergroup {
            name: "wg-data".to_string(),
            ..Usergroup::default()
        };
        let err = merge_usergroups(vec![], vec![incomplete], default_restriction())
            .expect_err("incomplete");
        assert!(err.to_string().contains("must have a long name"), "{err}");
    }

    #[test]
    fn merge_usergroups_external_groups_only_need_a_name() {
        let external = Usergroup {
            name: "vendor-oncall".to_string(),
            external: true,
            ..Usergroup::default()
        };
        let merged =
            merge_usergroups(vec![], vec![external], default_restriction()).expect("merge");
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn merge_usergroups_rejects_duplicate_handles() {
        let err = merge_usergroups(
            vec![group("wg-data")],
            vec![group("wg-data")],
            default_restriction(),
        )
        .expect_err("dup");
        assert!(err.to_string().contains("duplicate usergroup"), "{err}");
    }

    #[test]
    fn merge_restrictions_can_only_be_defined_once() {
        let a = vec![Restriction {
            path: "foo.yaml".to_string(),
            ..Restriction::default()
        }];
        let b = vec![Restriction {
            path: "bar.yaml".to_string(),
            ..Restriction::default()
        }];
        let err = merge_restrictions(a.clone(), b).expect_err("twice");
        assert!(
            err.to_string().contains("can only be defined once"),
            "{err}"
        );

        let kept = merge_restrictions(a, vec![]).expect("keep existing");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].path, "foo.yaml");
    }

    #[test]
    fn merge_restrictions_compiles_incoming_patterns() {
        let incoming = vec![Restriction {
            path: "foo.yaml".to_string(),
            channel_patterns: vec!["foo.*".to_string()],
            usergroup_patterns: vec!["bar.*".to_string()],
            ..Restriction::default()
        }];
        let merged = merge_restrictions(vec![], incoming).expect("compile");
        assert!(matches_regex_list("foothing", &merged[0].channels));
        assert!(matches_regex_list("barthing", &merged[0].usergroups));
    }

    #[test]
    fn merge_restrictions_rejects_invalid_regexes() {
        for patterns in [
            (vec!["foo(".to_string()], vec![]),
            (vec![], vec!["bar(".to_string()]),
        ] {
            let incoming = vec![Restriction {
                path: "foo.yaml".to_string(),
                channel_patterns: patterns.0,
                usergroup_patterns: patterns.1,
                ..Restriction::default()
            }];
            merge_restrictions(vec![], incoming).expect_err("invalid regex");
        }
    }

    #[test]
    fn parse_rejects_unknown_keys() {
        let mut p = Parser::new();
        let err = p
            .parse(b"channles:\n  - name: sig-typo\n", "typo.yaml")
            .expect_err("unknown key");
        assert!(err.to_string().contains("failed to parse yaml"), "{err}");
    }

    #[test]
    fn parse_merges_template_once() {
        let mut p = Parser::new();
        p.parse(b"channel_template:\n  topic: welcome\n", "a.yaml")
            .expect("first template");
        let err = p
            .parse(b"channel_template:\n  topic: other\n", "b.yaml")
            .expect_err("second template");
        assert!(
            err.to_string().contains("can't overwrite existing channel template"),
            "{err}"
        );
        assert_eq!(p.config.channel_template.topic, "welcome");
    }

    #[test]
    fn parse_enforces_restrictions_by_logical_path() {
        let mut p = Parser::new();
        p.parse(
            b"restrictions:\n  - path: admins.yaml\n    users: true\n",
            "restrictions.yaml",
        )
        .expect("load restrictions");

        // admins.yaml may declare users but nothing else.
        p.parse(b"users:\n  alice: U00000001\n", "admins.yaml")
            .expect("users allowed");
        let before = p.config.channels.len();
        let err = p
            .parse(b"channels:\n  - name: sig-sneaky\n", "admins.yaml")
            .expect_err("channels denied");
        assert!(err.to_string().contains("couldn't merge channels"), "{err}");
        assert_eq!(p.config.channels.len(), before);
    }

    #[test]
    fn parse_file_skips_already_parsed_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("users.yaml");
        fs::write(&file, "users:\n  alice: U00000001\n").expect("write");

        let mut p = Parser::new();
        p.parse_file(&file, dir.path()).expect("first parse");
        // A second parse of the same physical path must not re-merge (which
        // would trip the duplicate-user check).
        p.parse_file(&file, dir.path()).expect("second parse");
        assert_eq!(p.config.users.len(), 1);
    }

    #[test]
    fn parse_file_outside_base_dir_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let other = tempfile::tempdir().expect("tempdir");
        let file = other.path().join("users.yaml");
        fs::write(&file, "users: {}\n").expect("write");

        let mut p = Parser::new();
        let err = p.parse_file(&file, dir.path()).expect_err("outside base");
        assert!(err.to_string().contains("is not a prefix of"), "{err}");
    }

    #[test]
    fn parse_dir_walks_yaml_tree_lexicographically() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("sub")).expect("mkdir");
        fs::write(
            dir.path().join("a.yaml"),
            "channels:\n  - name: sig-first\n",
        )
        .expect("write");
        fs::write(
            dir.path().join("b.yaml"),
            "channels:\n  - name: sig-second\n",
        )
        .expect("write");
        fs::write(
            dir.path().join("sub").join("c.yaml"),
            "channels:\n  - name: sig-third\n",
        )
        .expect("write");
        fs::write(dir.path().join("ignored.txt"), "not yaml").expect("write");

        let mut p = Parser::new();
        p.parse_dir(dir.path()).expect("parse dir");
        let names: Vec<&str> = p.config.channels.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["sig-first", "sig-second", "sig-third"]);
    }
}
