// src/config/assemble.rs

//! Turn a validated [`PipelineFile`] into a runnable [`Pipeline`].

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::model::{InputBinding, NodeConfig, PipelineFile};
use crate::engine::{Pipeline, PipelineBuilder};
use crate::errors::{ConfigurationError, ImgdagError, ParamError, Result};
use crate::exec::{ExecutableNode, Parameters};
use crate::ops::OperationRegistry;
use crate::types::NodeId;
use crate::value::{Circle, Contour, Line, Point, Rect, Value};

/// A pipeline plus the identities its named nodes received.
#[derive(Debug)]
pub struct AssembledPipeline {
    pub pipeline: Pipeline,
    pub names: BTreeMap<String, NodeId>,
}

impl AssembledPipeline {
    pub fn id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        self.names
            .iter()
            .find(|(_, v)| **v == id)
            .map(|(k, _)| k.as_str())
    }
}

/// Build every node (in name order), wire its inputs and freeze the result.
pub fn assemble(cfg: &PipelineFile, registry: &OperationRegistry) -> Result<AssembledPipeline> {
    let mut builder = PipelineBuilder::new().options(cfg.runtime().scheduler_options());
    let mut names = BTreeMap::new();

    for (name, node_cfg) in cfg.nodes() {
        let node = build_node(name, node_cfg, registry).map_err(|source| in_node(name, source))?;
        let id = builder
            .add_node(node)
            .map_err(|source| in_node(name, source))?;
        debug!(node = %id, name = %name, op = %node_cfg.op, "assembled node");
        names.insert(name.clone(), id);
    }

    for (name, node_cfg) in cfg.nodes() {
        wire_inputs(&mut builder, &names, name, &node_cfg.inputs)
            .map_err(|source| in_node(name, source))?;
    }

    let pipeline = builder.build().map_err(|err| {
        let culprit = match &err {
            ConfigurationError::UnboundPort { node, .. } => Some(*node),
            _ => None,
        };
        match culprit.and_then(|id| names.iter().find(|(_, v)| **v == id)) {
            Some((name, _)) => in_node(name, err),
            None => ImgdagError::Graph(err),
        }
    })?;

    info!(
        nodes = pipeline.len(),
        edges = pipeline.graph().edge_count(),
        max_concurrency = pipeline.options().max_concurrency,
        "pipeline assembled"
    );
    Ok(AssembledPipeline { pipeline, names })
}

fn in_node(name: &str, source: ConfigurationError) -> ImgdagError {
    ImgdagError::Node {
        name: name.to_string(),
        source,
    }
}

fn build_node(
    name: &str,
    cfg: &NodeConfig,
    registry: &OperationRegistry,
) -> std::result::Result<ExecutableNode, ConfigurationError> {
    let op = registry.create(&cfg.op)?;
    let params = convert_params(&cfg.params).map_err(|source| {
        ConfigurationError::InvalidParameter {
            op: cfg.op.clone(),
            source,
        }
    })?;
    Ok(ExecutableNode::from_boxed(op, params).with_label(name))
}

fn wire_inputs(
    builder: &mut PipelineBuilder,
    names: &BTreeMap<String, NodeId>,
    name: &str,
    inputs: &InputBinding,
) -> std::result::Result<(), ConfigurationError> {
    let lookup = |producer: &str| {
        names
            .get(producer)
            .copied()
            .ok_or_else(|| ConfigurationError::Invalid(format!("unknown input '{producer}'")))
    };
    let consumer = lookup(name)?;

    match inputs {
        InputBinding::Positional(producers) => {
            let ports: Vec<&'static str> = builder
                .graph()
                .signature(consumer)
                .map(|sig| sig.inputs.iter().map(|p| p.name).collect())
                .unwrap_or_default();
            if producers.len() > ports.len() {
                return Err(ConfigurationError::Invalid(format!(
                    "{} inputs given, but the operation takes {}",
                    producers.len(),
                    ports.len()
                )));
            }
            for (producer, port) in producers.iter().zip(ports) {
                builder.add_edge(lookup(producer.as_str())?, consumer, Some(port))?;
            }
        }
        InputBinding::Named(bindings) => {
            for (port, producer) in bindings {
                builder.add_edge(lookup(producer.as_str())?, consumer, Some(port.as_str()))?;
            }
        }
    }
    Ok(())
}

/// Convert a `[node.<name>.params]` table into typed parameters.
pub fn convert_params(table: &toml::Table) -> std::result::Result<Parameters, ParamError> {
    table
        .iter()
        .map(|(key, value)| param_value(key, value).map(|v| (key.clone(), v)))
        .collect()
}

/// Convert one TOML value.
///
/// Scalars map directly; inline tables are recognised by their key set
/// (`{x, y}` point, `{x, y, radius}` circle, `{x, y, width, height}` rect,
/// `{x1, y1, x2, y2}` line); arrays of points form a contour.
pub fn param_value(key: &str, value: &toml::Value) -> std::result::Result<Value, ParamError> {
    match value {
        toml::Value::Integer(i) => Ok(Value::Int(*i)),
        toml::Value::Float(f) => Ok(Value::Float(*f)),
        toml::Value::Boolean(b) => Ok(Value::Bool(*b)),
        toml::Value::String(s) => Ok(Value::Text(s.clone())),
        toml::Value::Table(table) => shape(key, table),
        toml::Value::Array(items) => {
            let points = items
                .iter()
                .map(|item| match item {
                    toml::Value::Table(t) if has_keys(t, &["x", "y"]) => {
                        Ok(Point::new(number(key, t, "x")?, number(key, t, "y")?))
                    }
                    _ => Err(unsupported(key, "arrays must contain {x, y} points")),
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Value::Contour(Contour::new(points)))
        }
        toml::Value::Datetime(_) => Err(unsupported(key, "datetimes are not supported")),
    }
}

fn shape(key: &str, t: &toml::Table) -> std::result::Result<Value, ParamError> {
    let n = |field: &str| number(key, t, field);

    if has_keys(t, &["x", "y"]) {
        Ok(Value::Point(Point::new(n("x")?, n("y")?)))
    } else if has_keys(t, &["x", "y", "radius"]) {
        Ok(Value::Circle(Circle::new(Point::new(n("x")?, n("y")?), n("radius")?)))
    } else if has_keys(t, &["x", "y", "width", "height"]) {
        Ok(Value::Rect(Rect::new(n("x")?, n("y")?, n("width")?, n("height")?)))
    } else if has_keys(t, &["x1", "y1", "x2", "y2"]) {
        Ok(Value::Line(Line::new(
            Point::new(n("x1")?, n("y1")?),
            Point::new(n("x2")?, n("y2")?),
        )))
    } else {
        let mut fields: Vec<&str> = t.keys().map(String::as_str).collect();
        fields.sort_unstable();
        Err(unsupported(
            key,
            format!("unrecognised table shape {{{}}}", fields.join(", ")),
        ))
    }
}

fn has_keys(t: &toml::Table, keys: &[&str]) -> bool {
    t.len() == keys.len() && keys.iter().all(|k| t.contains_key(*k))
}

fn number(key: &str, t: &toml::Table, field: &str) -> std::result::Result<f64, ParamError> {
    match t.get(field) {
        Some(toml::Value::Float(f)) => Ok(*f),
        Some(toml::Value::Integer(i)) => Ok(*i as f64),
        _ => Err(unsupported(key, format!("field '{field}' must be a number"))),
    }
}

fn unsupported(key: &str, reason: impl Into<String>) -> ParamError {
    ParamError::Invalid {
        key: key.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::RawPipelineFile;

    fn table(src: &str) -> toml::Table {
        toml::from_str(src).unwrap()
    }

    fn pipeline(src: &str) -> PipelineFile {
        let raw: RawPipelineFile = toml::from_str(src).unwrap();
        PipelineFile::try_from(raw).unwrap()
    }

    #[test]
    fn scalar_and_shaped_params_convert() {
        let params = convert_params(&table(
            r#"
            kernel_size = 5
            sigma = 1.5
            invert = false
            path = "a.pgm"
            origin = { x = 1, y = 2.5 }
            ring = { x = 0, y = 0, radius = 3 }
            roi = { x = 0, y = 0, width = 4, height = 2 }
            edge = { x1 = 0, y1 = 0, x2 = 1, y2 = 1 }
            poly = [{ x = 0, y = 0 }, { x = 1, y = 0 }, { x = 1, y = 1 }]
            "#,
        ))
        .unwrap();

        assert_eq!(params.get::<i64>("kernel_size"), Ok(5));
        assert_eq!(params.get::<f64>("sigma"), Ok(1.5));
        assert_eq!(params.get::<bool>("invert"), Ok(false));
        assert_eq!(params.get::<String>("path"), Ok("a.pgm".to_string()));
        assert_eq!(params.get::<Point>("origin"), Ok(Point::new(1.0, 2.5)));
        assert_eq!(params.get::<Circle>("ring").unwrap().radius, 3.0);
        assert_eq!(params.get::<Rect>("roi"), Ok(Rect::new(0.0, 0.0, 4.0, 2.0)));
        assert_eq!(params.get::<Line>("edge").unwrap().end, Point::new(1.0, 1.0));
        assert_eq!(params.get::<Contour>("poly").unwrap().len(), 3);
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        let err = convert_params(&table("odd = { x = 1, z = 2 }")).unwrap_err();
        assert!(matches!(err, ParamError::Invalid { ref key, .. } if key == "odd"));
        assert!(convert_params(&table("bad = [1, 2]")).is_err());
        assert!(convert_params(&table("p = { x = 1, y = \"2\" }")).is_err());
    }

    #[test]
    fn assembles_named_and_positional_inputs() {
        let cfg = pipeline(
            r#"
            [runtime]
            max_concurrency = 2

            [node.a]
            op = "geometry.line"
            params = { x1 = 0, y1 = 0, x2 = 2, y2 = 2 }

            [node.b]
            op = "geometry.line"
            params = { x1 = 0, y1 = 2, x2 = 2, y2 = 0 }

            [node.cross]
            op = "geometry.intersect_lines"
            inputs = { right = "b", left = "a" }

            [node.cross2]
            op = "geometry.intersect_lines"
            inputs = ["b", "a"]
            "#,
        );
        let assembled = assemble(&cfg, &OperationRegistry::builtin()).unwrap();
        let (a, b) = (assembled.id("a").unwrap(), assembled.id("b").unwrap());

        let graph = assembled.pipeline.graph();
        assert_eq!(graph.predecessor_ids(assembled.id("cross").unwrap()), vec![a, b]);
        assert_eq!(graph.predecessor_ids(assembled.id("cross2").unwrap()), vec![b, a]);
        assert_eq!(assembled.pipeline.options().max_concurrency, 2);
        assert_eq!(assembled.name_of(a), Some("a"));
        assert_eq!(
            assembled.pipeline.node(a).unwrap().display_name(),
            "a"
        );
    }

    #[test]
    fn errors_name_the_offending_node() {
        let cfg = pipeline(
            r#"
            [node.src]
            op = "image.sharpen"
            "#,
        );
        let err = assemble(&cfg, &OperationRegistry::builtin()).unwrap_err();
        assert!(matches!(
            err,
            ImgdagError::Node { ref name, source: ConfigurationError::UnknownOperation(_) } if name == "src"
        ));

        let cfg = pipeline(
            r#"
            [node.p]
            op = "geometry.point"
            params = { x = 1, y = 1 }

            [node.blur]
            op = "image.gaussian_blur"
            inputs = ["p"]
            params = { kernel_size = 3, sigma = 1.0 }
            "#,
        );
        let err = assemble(&cfg, &OperationRegistry::builtin()).unwrap_err();
        assert!(matches!(
            err,
            ImgdagError::Node { ref name, source: ConfigurationError::IncompatibleTypes { .. } } if name == "blur"
        ));
    }

    #[test]
    fn unbound_ports_fail_assembly() {
        let cfg = pipeline(
            r#"
            [node.a]
            op = "geometry.line"
            params = { x1 = 0, y1 = 0, x2 = 2, y2 = 2 }

            [node.cross]
            op = "geometry.intersect_lines"
            inputs = ["a"]
            "#,
        );
        let err = assemble(&cfg, &OperationRegistry::builtin()).unwrap_err();
        assert!(matches!(
            err,
            ImgdagError::Node { ref name, source: ConfigurationError::UnboundPort { .. } } if name == "cross"
        ));
    }
}
