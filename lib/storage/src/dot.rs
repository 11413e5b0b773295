//! Graphviz DOT export.
//!
//! Node statements carry the label, `pos="x,y,z"` and size; edge statements
//! carry weight and label. Graph attributes and the texture-node mode become
//! graph-level attributes. User attributes are written as `"attr.<key>"` so
//! they never shadow those keys. The file is replaced atomically so readers
//! never see a partial export.
//!
//! [`from_dot`] reads back the statement forms written here, which is enough
//! to rebuild an equivalent graph from an export. It is not a general DOT
//! parser.

use anyhow::{anyhow, bail, Context, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use hyphae_core::{Graph, GraphStore, NodeId, NodeKind, Point3};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::Write;
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

const ATTRIBUTE_PREFIX: &str = "attr.";

fn attribute_key(key: &str) -> String {
    quote(&format!("{ATTRIBUTE_PREFIX}{key}"))
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Renders `graph` as a DOT digraph.
pub fn to_dot(graph: &Graph) -> String {
    let mut out = String::new();
    out.push_str("digraph G {\n");

    let _ = write!(out, "  graph [texture_node_mode={}", quote(graph.texture_node_mode()));
    for (key, value) in graph.attributes().iter() {
        let _ = write!(out, ", {}={}", attribute_key(key), quote(value));
    }
    out.push_str("];\n");

    for node in graph.nodes() {
        let p = node.position;
        let _ = write!(
            out,
            "  {} [label={}, pos=\"{},{},{}\", size={}",
            node.id,
            quote(&node.label),
            p.x,
            p.y,
            p.z,
            node.size
        );
        if let NodeKind::Image { path } = &node.kind {
            let _ = write!(out, ", image={}", quote(&path.to_string_lossy()));
        }
        for (key, value) in node.attributes.iter() {
            let _ = write!(out, ", {}={}", attribute_key(key), quote(value));
        }
        out.push_str("];\n");
    }

    for edge in graph.edges() {
        let _ = write!(out, "  {} -> {} [weight={}", edge.source, edge.target, edge.weight);
        if !edge.label.is_empty() {
            let _ = write!(out, ", label={}", quote(&edge.label));
        }
        out.push_str("];\n");
    }

    out.push_str("}\n");
    out
}

fn token(chars: &mut Peekable<Chars<'_>>, stop: char) -> Result<String> {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
    let mut out = String::new();
    if chars.peek() == Some(&'"') {
        chars.next();
        loop {
            match chars.next() {
                Some('"') => return Ok(out),
                Some('\\') => match chars.next() {
                    Some('n') => out.push('\n'),
                    Some(c) => out.push(c),
                    None => bail!("unterminated escape"),
                },
                Some(c) => out.push(c),
                None => bail!("unterminated string"),
            }
        }
    }
    while let Some(&c) = chars.peek() {
        if c == stop {
            break;
        }
        out.push(c);
        chars.next();
    }
    Ok(out.trim().to_string())
}

/// Splits `key=value, key="quoted value"` into pairs.
fn parse_attributes(list: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    let mut chars = list.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }
        if chars.peek().is_none() {
            return Ok(pairs);
        }
        let key = token(&mut chars, '=')?;
        if chars.next() != Some('=') {
            bail!("expected '=' after attribute '{}'", key);
        }
        let value = token(&mut chars, ',')?;
        pairs.push((key, value));
    }
}

fn parse_position(value: &str) -> Result<Point3> {
    let coords: Vec<f64> = value
        .trim_end_matches('!')
        .split(',')
        .map(|c| c.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("invalid pos \"{value}\""))?;
    match coords[..] {
        [x, y] => Ok(Point3::new(x, y, 0.0)),
        [x, y, z] => Ok(Point3::new(x, y, z)),
        _ => Err(anyhow!("invalid pos \"{value}\"")),
    }
}

/// Splits a statement into its head and the text between `[` and `]`.
fn split_statement(line: &str) -> (&str, &str) {
    let line = line.trim_end_matches(';');
    match (line.find('['), line.rfind(']')) {
        (Some(open), Some(close)) if open < close => (line[..open].trim(), &line[open + 1..close]),
        _ => (line.trim(), ""),
    }
}

/// Rebuilds a graph from DOT text in the form produced by [`to_dot`].
/// Ids are reassigned in file order.
pub fn from_dot(dot: &str) -> Result<Graph> {
    let mut graph = Graph::new();
    let mut ids: HashMap<String, NodeId> = HashMap::new();

    fn node_for(graph: &mut Graph, ids: &mut HashMap<String, NodeId>, name: &str) -> NodeId {
        *ids.entry(name.to_string()).or_insert_with(|| graph.add_node())
    }

    for (number, raw) in dot.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line == "}" || line.starts_with("digraph") || line.starts_with("//") {
            continue;
        }
        let (head, list) = split_statement(line);
        let attrs = parse_attributes(list).with_context(|| format!("line {}", number + 1))?;

        if head == "graph" {
            for (key, value) in attrs {
                match key.strip_prefix(ATTRIBUTE_PREFIX) {
                    Some(name) => graph.set_attribute(name, value),
                    None if key == "texture_node_mode" => graph.set_texture_node_mode(value),
                    None => graph.set_attribute(key, value),
                }
            }
        } else if let Some((source, target)) = head.split_once("->") {
            let source = node_for(&mut graph, &mut ids, source.trim());
            let target = node_for(&mut graph, &mut ids, target.trim());
            let mut weight = 1.0;
            let mut label = None;
            for (key, value) in attrs {
                match key.as_str() {
                    "weight" => {
                        weight = value
                            .parse()
                            .with_context(|| format!("line {}: invalid weight", number + 1))?
                    }
                    "label" => label = Some(value),
                    _ => {}
                }
            }
            let edge = graph.add_edge(source, target, weight)?;
            if let Some(label) = label {
                graph.set_edge_label(edge, label)?;
            }
        } else {
            let id = node_for(&mut graph, &mut ids, head);
            for (key, value) in attrs {
                if let Some(name) = key.strip_prefix(ATTRIBUTE_PREFIX) {
                    graph.set_node_attribute(id, name, value)?;
                    continue;
                }
                match key.as_str() {
                    "label" => graph.set_node_label(id, value)?,
                    "pos" => graph.set_node_position(id, parse_position(&value)?)?,
                    "size" => graph.set_node_size(
                        id,
                        value
                            .parse()
                            .with_context(|| format!("line {}: invalid size", number + 1))?,
                    )?,
                    "image" => graph.set_node_kind(id, NodeKind::Image { path: value.into() })?,
                    _ => graph.set_node_attribute(id, key, value)?,
                }
            }
        }
    }
    Ok(graph)
}

/// Reads a DOT file written by [`GraphExport::write`].
pub fn read<P: AsRef<Path>>(path: P) -> Result<Graph> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    from_dot(&text)
}

/// Writing the committed graph state to a DOT file.
pub trait GraphExport {
    fn write<P: AsRef<Path>>(&self, path: P) -> Result<()>;
}

impl GraphExport for Graph {
    fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let dot = to_dot(self);
        AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
            .write(|f| f.write_all(dot.as_bytes()))?;
        tracing::info!(
            path = %path.display(),
            nodes = self.node_count(),
            edges = self.edge_count(),
            "graph written"
        );
        Ok(())
    }
}

impl GraphExport for GraphStore {
    /// Exports a snapshot, so the file reflects whole committed iterations
    /// even while a layout is running.
    fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.snapshot().write(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyphae_core::Point3;

    #[test]
    fn test_dot_contains_positions_labels_and_weights() {
        let mut g = Graph::new();
        let a = g.add_labeled_node("say \"hi\"");
        let b = g.add_node();
        g.set_node_position(a, Point3::new(1.5, -2.0, 0.0)).unwrap();
        let e = g.add_edge(a, b, 3.0).unwrap();
        g.set_edge_label(e, "link").unwrap();

        let dot = to_dot(&g);
        assert!(dot.starts_with("digraph G {\n"));
        assert!(dot.contains("texture_node_mode=\"rotate\""));
        assert!(dot.contains(r#"0 [label="say \"hi\"", pos="1.5,-2,0", size=1]"#));
        assert!(dot.contains(r#"0 -> 1 [weight=3, label="link"]"#));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn test_export_reads_back_equivalent_graph() {
        let mut g = Graph::new();
        let a = g.add_labeled_node("a, \"quoted\"");
        let b = g.add_node();
        let c = g.add_labeled_node("c");
        g.set_node_position(a, Point3::new(0.1, -7.25, 1e-3)).unwrap();
        g.set_node_size(b, 2.5).unwrap();
        g.set_node_attribute(c, "group", "x").unwrap();
        g.add_edge(a, b, 0.3).unwrap();
        let e = g.add_edge(b, c, 4.0).unwrap();
        g.set_edge_label(e, "b->c").unwrap();
        g.set_attribute("title", "demo");

        let back = from_dot(&to_dot(&g)).unwrap();
        assert_eq!(back.node_count(), 3);
        assert_eq!(back.edge_count(), 2);
        for (x, y) in g.nodes().zip(back.nodes()) {
            assert_eq!(x.label, y.label);
            assert_eq!(x.position, y.position);
            assert_eq!(x.size, y.size);
            assert_eq!(x.attributes, y.attributes);
        }
        for (x, y) in g.edges().zip(back.edges()) {
            assert_eq!((x.source, x.target, x.weight), (y.source, y.target, y.weight));
            assert_eq!(x.label, y.label);
        }
        assert_eq!(back.attributes().get("title"), Some("demo"));
    }

    #[test]
    fn test_attributes_named_like_fields_read_back_as_attributes() {
        let mut g = Graph::new();
        let a = g.add_labeled_node("a");
        let b = g.add_labeled_node("real");
        g.set_node_size(a, 2.0).unwrap();
        g.set_node_attribute(a, "size", "large").unwrap();
        g.set_node_attribute(b, "label", "meta").unwrap();
        g.set_node_attribute(b, "pos", "nowhere").unwrap();
        g.set_texture_node_mode("align");
        g.set_attribute("texture_node_mode", "shadow");

        let dot = to_dot(&g);
        assert!(dot.contains(r#""attr.size"="large""#));

        let back = from_dot(&dot).unwrap();
        let a2 = back.node(a).unwrap();
        assert_eq!(a2.size, 2.0);
        assert_eq!(a2.attributes.get("size"), Some("large"));
        let b2 = back.node(b).unwrap();
        assert_eq!(b2.label, "real");
        assert_eq!(b2.position, Point3::ZERO);
        assert_eq!(b2.attributes.get("label"), Some("meta"));
        assert_eq!(b2.attributes.get("pos"), Some("nowhere"));
        assert_eq!(back.texture_node_mode(), "align");
        assert_eq!(back.attributes().get("texture_node_mode"), Some("shadow"));
    }

    #[test]
    fn test_from_dot_rejects_bad_values() {
        assert!(from_dot("digraph G {\n  0 [pos=\"1,x\"];\n}\n").is_err());
        assert!(from_dot("digraph G {\n  0 -> 1 [weight=-1];\n}\n").is_err());
    }

    #[test]
    fn test_store_write_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.dot");
        std::fs::write(&path, "stale").unwrap();

        let store = GraphStore::new();
        let a = store.add_node();
        let b = store.add_node();
        store.add_edge(a, b, 1.0).unwrap();
        store.write(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("0 -> 1 [weight=1]"));
        assert!(!written.contains("stale"));
        assert_eq!(read(&path).unwrap().edge_count(), 1);
    }
}
