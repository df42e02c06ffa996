//! Canonical symbol URI parsing.
//!
//! A URI has a space-separated header followed by a descriptor section:
//!
//! ```text
//! scip-python python my_pkg 1.0.2 `core.search.rank`/SymbolRank#rank().(query)
//! ^scheme     ^manager ^name ^version ^module path   ^descriptor chain
//! ```
//!
//! The module path is backtick-delimited and terminated by `/`. Every
//! following segment is classified by its terminal marker. Locals use the
//! short form `local <id>`.

use crate::errors::{OracleError, OracleResult};
use crate::models::{Descriptor, DescriptorKind, Package, Symbol};

const LOCAL_PREFIX: &str = "local ";

/// Parse a canonical symbol URI into a [`Symbol`].
///
/// Pure and deterministic. Fails when the header is incomplete, the
/// backtick-delimited module section is missing, the descriptor chain is
/// empty, or a segment carries no recognizable terminal marker.
pub fn parse_symbol(uri: &str) -> OracleResult<Symbol> {
    let trimmed = uri.trim();
    if trimmed.is_empty() {
        return Err(OracleError::parse(uri));
    }

    if let Some(local_id) = trimmed.strip_prefix(LOCAL_PREFIX) {
        let local_id = local_id.trim();
        if local_id.is_empty() {
            return Err(OracleError::parse(uri));
        }
        return Ok(Symbol::from_parts(
            trimmed.to_string(),
            "local".to_string(),
            None,
            String::new(),
            vec![Descriptor::new(local_id, DescriptorKind::Local)],
        ));
    }

    let mut parts = trimmed.splitn(5, ' ');
    let mut header = || {
        parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| OracleError::parse(uri))
    };
    let scheme = header()?;
    let manager = header()?;
    let name = header()?;
    let version = header()?;
    let section = parts.next().map(str::trim).unwrap_or("");
    if section.is_empty() {
        return Err(OracleError::parse(uri));
    }

    let (module_path, rest) = split_module_section(section).ok_or_else(|| OracleError::parse(uri))?;

    let mut descriptors = vec![Descriptor::new(module_path, DescriptorKind::Module)];
    let mut remaining = rest;
    while !remaining.is_empty() {
        let (descriptor, consumed) =
            next_descriptor(remaining).ok_or_else(|| OracleError::parse(uri))?;
        descriptors.push(descriptor);
        remaining = &remaining[consumed..];
    }

    Ok(Symbol::from_parts(
        trimmed.to_string(),
        scheme.to_string(),
        Some(Package {
            manager: manager.to_string(),
            name: name.to_string(),
            version: version.to_string(),
        }),
        module_path.to_string(),
        descriptors,
    ))
}

/// Split `` `a.b.c`/rest `` into `("a.b.c", "rest")`.
fn split_module_section(section: &str) -> Option<(&str, &str)> {
    let inner = section.strip_prefix('`')?;
    let close = inner.find('`')?;
    let module_path = &inner[..close];
    if module_path.trim().is_empty() {
        return None;
    }
    let rest = inner[close + 1..].strip_prefix('/')?;
    Some((module_path, rest))
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '+' | '-' | '$')
}

/// Read one descriptor from the front of `s`, returning it together with the
/// number of bytes consumed.
fn next_descriptor(s: &str) -> Option<(Descriptor, usize)> {
    if let Some(inner) = s.strip_prefix('(') {
        let close = inner.find(')')?;
        let name = &inner[..close];
        if name.is_empty() {
            return None;
        }
        return Some((Descriptor::new(name, DescriptorKind::Parameter), close + 2));
    }
    if let Some(inner) = s.strip_prefix('[') {
        let close = inner.find(']')?;
        let name = &inner[..close];
        if name.is_empty() {
            return None;
        }
        return Some((Descriptor::new(name, DescriptorKind::Parameter), close + 2));
    }

    let (name, name_len) = if let Some(inner) = s.strip_prefix('`') {
        let close = inner.find('`')?;
        (&inner[..close], close + 2)
    } else {
        let end = s
            .char_indices()
            .find(|(_, c)| !is_ident_char(*c))
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        (&s[..end], end)
    };
    if name.is_empty() {
        return None;
    }

    let after = &s[name_len..];
    let marker = after.chars().next()?;
    let simple = |kind| Some((Descriptor::new(name, kind), name_len + 1));
    match marker {
        '/' => simple(DescriptorKind::Module),
        '#' => simple(DescriptorKind::Class),
        '.' => simple(DescriptorKind::Attribute),
        ':' => simple(DescriptorKind::Meta),
        '!' => simple(DescriptorKind::Macro),
        '(' => {
            let close = after.find(')')?;
            if after[close + 1..].chars().next() != Some('.') {
                return None;
            }
            let disambiguator = &after[1..close];
            let descriptor = Descriptor {
                name: name.to_string(),
                kind: DescriptorKind::Method,
                disambiguator: (!disambiguator.is_empty()).then(|| disambiguator.to_string()),
            };
            Some((descriptor, name_len + close + 2))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "scip-python python automata_docs 75482692a6fe30c72db516201a6f47d9fb4af065";

    fn uri(descriptors: &str) -> String {
        format!("{PREFIX} {descriptors}")
    }

    fn kinds(symbol: &Symbol) -> Vec<DescriptorKind> {
        symbol.descriptors().iter().map(|d| d.kind).collect()
    }

    #[test]
    fn test_parse_class_attribute() {
        let s = parse_symbol(&uri("`config.automata_agent_config`/AutomataAgentConfig#description."))
            .unwrap();
        assert_eq!(s.scheme(), "scip-python");
        let package = s.package().unwrap();
        assert_eq!(package.manager, "python");
        assert_eq!(package.name, "automata_docs");
        assert_eq!(package.version, "75482692a6fe30c72db516201a6f47d9fb4af065");
        assert_eq!(s.module_path(), "config.automata_agent_config");
        assert_eq!(
            s.dotpath(),
            "config.automata_agent_config.AutomataAgentConfig.description"
        );
        assert_eq!(
            kinds(&s),
            vec![
                DescriptorKind::Module,
                DescriptorKind::Class,
                DescriptorKind::Attribute
            ]
        );
    }

    #[test]
    fn test_parse_method_parameter() {
        let s = parse_symbol(&uri(
            "`config.automata_agent_config`/AutomataAgentConfig#load().(config_name)",
        ))
        .unwrap();
        assert_eq!(
            s.dotpath(),
            "config.automata_agent_config.AutomataAgentConfig.load.config_name"
        );
        assert_eq!(s.kind(), DescriptorKind::Parameter);
        assert_eq!(s.descriptors()[2].kind, DescriptorKind::Method);
    }

    #[test]
    fn test_parse_module_level_attribute() {
        let s = parse_symbol(&uri("`core.tasks.automata_task_executor`/logger.")).unwrap();
        assert_eq!(s.dotpath(), "core.tasks.automata_task_executor.logger");
        assert_eq!(s.kind(), DescriptorKind::Attribute);
    }

    #[test]
    fn test_parse_class_and_init() {
        let class = parse_symbol(&uri("`core.agent.automata_agent_enums`/ActionIndicator#")).unwrap();
        assert_eq!(class.kind(), DescriptorKind::Class);
        assert_eq!(class.name(), "ActionIndicator");

        let init = parse_symbol(&uri("`core.base.tool`/ToolNotFoundError#__init__().")).unwrap();
        assert_eq!(init.kind(), DescriptorKind::Method);
        assert_eq!(init.dotpath(), "core.base.tool.ToolNotFoundError.__init__");
    }

    #[test]
    fn test_parse_module_only() {
        let s = parse_symbol(&uri("`core.base.tool`/")).unwrap();
        assert_eq!(s.kind(), DescriptorKind::Module);
        assert_eq!(s.dotpath(), "core.base.tool");
    }

    #[test]
    fn test_parse_disambiguator_macro_meta_type_param() {
        let s = parse_symbol(&uri("`m`/Box#new(+1).")).unwrap();
        assert_eq!(s.descriptors()[2].disambiguator.as_deref(), Some("+1"));

        let m = parse_symbol(&uri("`m`/println!")).unwrap();
        assert_eq!(m.kind(), DescriptorKind::Macro);

        let meta = parse_symbol(&uri("`m`/Config#schema:")).unwrap();
        assert_eq!(meta.kind(), DescriptorKind::Meta);

        let tp = parse_symbol(&uri("`m`/Vec#[T]")).unwrap();
        assert_eq!(tp.kind(), DescriptorKind::Parameter);
        assert_eq!(tp.dotpath(), "m.Vec.T");
    }

    #[test]
    fn test_parse_backticked_name() {
        let s = parse_symbol(&uri("`m`/`weird name`#")).unwrap();
        assert_eq!(s.name(), "weird name");
    }

    #[test]
    fn test_parse_local() {
        let s = parse_symbol("local 42").unwrap();
        assert_eq!(s.kind(), DescriptorKind::Local);
        assert_eq!(s.dotpath(), "42");
        assert!(s.package().is_none());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let text = uri("`evals.eval_helpers`/EvalAction#__init__().(action)");
        let a = parse_symbol(&text).unwrap();
        let b = parse_symbol(&text).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.dotpath(), b.dotpath());
        assert_eq!(a.descriptors(), b.descriptors());
    }

    #[test]
    fn test_missing_module_section() {
        let err = parse_symbol(&uri("core.base.tool/ToolNotFoundError#")).unwrap_err();
        match err {
            OracleError::Parse { offending_text } => assert!(offending_text.contains("core.base")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_descriptor_chain() {
        assert!(parse_symbol(PREFIX).is_err());
        assert!(parse_symbol(&uri("``/Foo#")).is_err());
        assert!(parse_symbol("").is_err());
        assert!(parse_symbol("local ").is_err());
    }

    #[test]
    fn test_missing_terminal_marker() {
        assert!(parse_symbol(&uri("`m`/Foo")).is_err());
        assert!(parse_symbol(&uri("`m`/Foo#bar()")).is_err());
        assert!(parse_symbol(&uri("`m`/Foo#bar?")).is_err());
        assert!(parse_symbol(&uri("`m`/Foo#()")).is_err());
    }

    #[test]
    fn test_incomplete_header() {
        assert!(parse_symbol("scip-python python `m`/Foo#").is_err());
    }
}
