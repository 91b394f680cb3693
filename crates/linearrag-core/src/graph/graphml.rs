//! GraphML persistence for the heterogeneous graph (`LinearRAG.graphml`).
//!
//! Grounded on `original_source/src/LinearRAG.py`'s use of `networkx.write_graphml`
//! / `read_graphml`, reimplemented with `quick-xml` the way Classacre-ferrumyx
//! uses it for its own on-disk XML formats. Vertex attributes are `name` and
//! `content`; edge attribute is `weight`. `content` is left empty — the graph
//! itself never carries passage text, only hashes (spec.md §4.3).

use std::io::Cursor;
use std::path::Path;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::error::{LinearRagError, Result};
use crate::graph::HeteroGraph;

const KEY_NAME: &str = "d0";
const KEY_CONTENT: &str = "d1";
const KEY_WEIGHT: &str = "d2";

pub struct GraphMl;

impl GraphMl {
    pub fn save(graph: &HeteroGraph, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LinearRagError::NamespaceWriteFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let mut buf = Vec::new();
        let mut writer = Writer::new_with_indent(Cursor::new(&mut buf), b' ', 2);

        write_decl(&mut writer)?;

        let mut graphml = BytesStart::new("graphml");
        graphml.push_attribute(("xmlns", "http://graphml.graphdrawing.org/xmlns"));
        writer
            .write_event(Event::Start(graphml))
            .map_err(xml_err)?;

        write_key(&mut writer, KEY_NAME, "node", "name", "string")?;
        write_key(&mut writer, KEY_CONTENT, "node", "content", "string")?;
        write_key(&mut writer, KEY_WEIGHT, "edge", "weight", "double")?;

        let mut graph_elem = BytesStart::new("graph");
        graph_elem.push_attribute(("edgedefault", "undirected"));
        writer
            .write_event(Event::Start(graph_elem))
            .map_err(xml_err)?;

        for idx in graph.graph.node_indices() {
            let name = graph.name_of(idx);
            let mut node = BytesStart::new("node");
            let id = format!("n{}", idx.index());
            node.push_attribute(("id", id.as_str()));
            writer.write_event(Event::Start(node)).map_err(xml_err)?;
            write_data(&mut writer, KEY_NAME, name)?;
            write_data(&mut writer, KEY_CONTENT, "")?;
            writer
                .write_event(Event::End(BytesEnd::new("node")))
                .map_err(xml_err)?;
        }

        for edge in graph.graph.edge_indices() {
            let (a, b) = graph.graph.edge_endpoints(edge).unwrap();
            let weight = graph.graph[edge];
            let mut edge_elem = BytesStart::new("edge");
            let source = format!("n{}", a.index());
            let target = format!("n{}", b.index());
            edge_elem.push_attribute(("source", source.as_str()));
            edge_elem.push_attribute(("target", target.as_str()));
            writer
                .write_event(Event::Start(edge_elem))
                .map_err(xml_err)?;
            write_data(&mut writer, KEY_WEIGHT, &weight.to_string())?;
            writer
                .write_event(Event::End(BytesEnd::new("edge")))
                .map_err(xml_err)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("graph")))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("graphml")))
            .map_err(xml_err)?;

        std::fs::write(path, buf)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<HeteroGraph> {
        let contents = std::fs::read_to_string(path)?;
        let mut reader = Reader::from_str(&contents);
        reader.config_mut().trim_text(true);

        let mut graph = HeteroGraph::empty();
        let mut id_to_index = std::collections::HashMap::new();

        let mut current_node_id: Option<String> = None;
        let mut current_name: Option<String> = None;
        let mut current_edge: Option<(String, String)> = None;
        let mut current_weight: Option<f32> = None;
        let mut current_key: Option<String> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf).map_err(xml_err)? {
                Event::Eof => break,
                Event::Start(e) | Event::Empty(e) => {
                    let local = e.local_name();
                    let tag = String::from_utf8_lossy(local.as_ref()).to_string();
                    match tag.as_str() {
                        "node" => {
                            current_node_id = attr(&e, "id");
                            current_name = None;
                        }
                        "edge" => {
                            let source = attr(&e, "source");
                            let target = attr(&e, "target");
                            if let (Some(s), Some(t)) = (source, target) {
                                current_edge = Some((s, t));
                            }
                            current_weight = None;
                        }
                        "data" => {
                            current_key = attr(&e, "key");
                        }
                        _ => {}
                    }
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(xml_err)?.into_owned();
                    match current_key.as_deref() {
                        Some(KEY_NAME) => current_name = Some(text),
                        Some(KEY_WEIGHT) => current_weight = text.parse::<f32>().ok(),
                        _ => {}
                    }
                }
                Event::End(e) => {
                    let local = e.local_name();
                    let tag = String::from_utf8_lossy(local.as_ref()).to_string();
                    match tag.as_str() {
                        "node" => {
                            if let (Some(id), Some(name)) =
                                (current_node_id.take(), current_name.take())
                            {
                                let idx = graph.graph.add_node(name.clone());
                                graph.node_index.insert(name, idx);
                                id_to_index.insert(id, idx);
                            }
                        }
                        "edge" => {
                            if let Some((source, target)) = current_edge.take() {
                                if let (Some(&a), Some(&b)) =
                                    (id_to_index.get(&source), id_to_index.get(&target))
                                {
                                    graph.graph.add_edge(a, b, current_weight.unwrap_or(0.0));
                                }
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
            buf.clear();
        }

        graph.passage_nodes = graph
            .node_index
            .iter()
            .filter(|(name, _)| name.starts_with("passage-"))
            .map(|(_, &idx)| idx)
            .collect();

        Ok(graph)
    }
}

fn attr(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.as_ref() == name.as_bytes() {
            Some(String::from_utf8_lossy(&a.value).to_string())
        } else {
            None
        }
    })
}

fn write_decl(writer: &mut Writer<Cursor<&mut Vec<u8>>>) -> Result<()> {
    writer
        .write_event(Event::Decl(quick_xml::events::BytesDecl::new(
            "1.0",
            Some("UTF-8"),
            None,
        )))
        .map_err(xml_err)
}

fn write_key(
    writer: &mut Writer<Cursor<&mut Vec<u8>>>,
    id: &str,
    domain: &str,
    attr_name: &str,
    attr_type: &str,
) -> Result<()> {
    let mut key = BytesStart::new("key");
    key.push_attribute(("id", id));
    key.push_attribute(("for", domain));
    key.push_attribute(("attr.name", attr_name));
    key.push_attribute(("attr.type", attr_type));
    writer
        .write_event(Event::Empty(key))
        .map_err(xml_err)
}

fn write_data(
    writer: &mut Writer<Cursor<&mut Vec<u8>>>,
    key: &str,
    value: &str,
) -> Result<()> {
    let mut data = BytesStart::new("data");
    data.push_attribute(("key", key));
    writer
        .write_event(Event::Start(data))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("data")))
        .map_err(xml_err)
}

fn xml_err(e: quick_xml::Error) -> LinearRagError {
    LinearRagError::GraphMl(e.to_string())
}
