use crate::apply::node::{self as apply_node, ApplyKind};
use crate::foundation::error::{RenderSetupError, RenderSetupResult};
use crate::foundation::ids::NodeId;
use crate::plug::handle::Plug;
use crate::plug::value::{PlugType, PlugValue};
use crate::scene::observer::{Pending, SceneEvent};
use crate::scene::snapshot::{ConnectionSnapshot, NodeSnapshot, SceneSnapshot};
use crate::scene::types::{NodeCategory, TypeRegistry};
use std::collections::{BTreeMap, BTreeSet};

const MAX_EVAL_DEPTH: usize = 1024;

/// One attribute: declared type plus stored (unconnected) value.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    /// Declared type.
    pub ty: PlugType,
    /// Stored value; shadowed by an input connection when there is one.
    pub value: PlugValue,
}

/// One scene node.
#[derive(Clone, Debug)]
pub struct Node {
    id: NodeId,
    name: String,
    type_name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attrs: BTreeMap<String, Attribute>,
    internal: bool,
    reference: Option<String>,
    compute: Option<ApplyKind>,
}

impl Node {
    /// Node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Leaf name, including any `ns:` prefixes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// DAG parent.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// DAG children in creation order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Attributes by name.
    pub fn attributes(&self) -> &BTreeMap<String, Attribute> {
        &self.attrs
    }

    /// Engine-owned node (apply-override or legacy layer); never selectable.
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    /// Namespace of the reference that created this node.
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// Apply-override compute kind, for engine-inserted nodes.
    pub fn compute(&self) -> Option<ApplyKind> {
        self.compute
    }
}

/// Edit made to a referenced node outside of an apply/unapply context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceEdit {
    /// Namespace of the edited reference.
    pub namespace: String,
    /// Human-readable description (`setAttr ns:pSphere1.translateX`, ...).
    pub edit: String,
}

#[derive(Clone, Debug)]
struct ReferenceState {
    loaded: bool,
    contents: SceneSnapshot,
}

/// Options for node creation.
#[derive(Clone, Debug, Default)]
pub(crate) struct NodeSpec {
    pub(crate) internal: bool,
    pub(crate) reference: Option<String>,
    pub(crate) compute: Option<ApplyKind>,
    pub(crate) exact_name: bool,
}

/// The scene dependency graph.
#[derive(Clone, Debug)]
pub struct Scene {
    types: TypeRegistry,
    nodes: BTreeMap<NodeId, Node>,
    next_id: u32,
    inputs: BTreeMap<Plug, Plug>,
    outputs: BTreeMap<Plug, BTreeSet<Plug>>,
    events: Vec<Pending>,
    ignore_reference_edits: bool,
    reference_edits: Vec<ReferenceEdit>,
    references: BTreeMap<String, ReferenceState>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_name(name: &str) -> RenderSetupResult<()> {
    let Some(first) = name.chars().next() else {
        return Err(RenderSetupError::scene("node name must be non-empty"));
    };
    if first.is_ascii_digit() {
        return Err(RenderSetupError::scene(format!(
            "node name '{name}' must not start with a digit"
        )));
    }
    if name.starts_with(':') || name.ends_with(':') {
        return Err(RenderSetupError::scene(format!(
            "node name '{name}' has an empty namespace segment"
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == ':'))
    {
        return Err(RenderSetupError::scene(format!(
            "node name '{name}' contains invalid character '{c}'"
        )));
    }
    Ok(())
}

/// Split a trailing run of digits: `pSphere12` -> (`pSphere`, 12).
fn split_trailing_number(name: &str) -> (&str, Option<u64>) {
    let digits = name.bytes().rev().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits == name.len() {
        return (name, None);
    }
    let (base, num) = name.split_at(name.len() - digits);
    (base, num.parse().ok())
}

impl Scene {
    /// Empty scene with the built-in type registry.
    pub fn new() -> Self {
        Self::with_types(TypeRegistry::builtin())
    }

    /// Empty scene with a custom type registry.
    pub fn with_types(types: TypeRegistry) -> Self {
        Self {
            types,
            nodes: BTreeMap::new(),
            next_id: 1,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            events: Vec::new(),
            ignore_reference_edits: false,
            reference_edits: Vec::new(),
            references: BTreeMap::new(),
        }
    }

    /// Type registry.
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Mutable type registry.
    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    // ---- nodes -------------------------------------------------------------------------------

    /// Look up a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    fn node_or_err(&self, id: NodeId) -> RenderSetupResult<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| RenderSetupError::scene(format!("unknown node {id}")))
    }

    /// All node ids in creation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Ids of user-visible (non-internal) nodes.
    pub fn user_node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .values()
            .filter(|n| !n.internal)
            .map(|n| n.id)
    }

    /// Number of nodes, internal ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Return `true` when the scene has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Return `true` for DAG nodes.
    pub fn is_dag(&self, id: NodeId) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|n| self.types.is_dag(&n.type_name))
    }

    /// Return `true` when the node's type belongs to `category`.
    pub fn has_category(&self, id: NodeId, category: NodeCategory) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|n| self.types.has_category(&n.type_name, category))
    }

    /// Create a node of `type_name`.
    ///
    /// A taken name is made unique by bumping its trailing number (`pSphere1` -> `pSphere2`).
    /// `parent` must be a DAG node and is only allowed for DAG types.
    pub fn create_node(
        &mut self,
        type_name: &str,
        name: &str,
        parent: Option<NodeId>,
    ) -> RenderSetupResult<NodeId> {
        self.create_node_with(type_name, name, parent, NodeSpec::default())
    }

    pub(crate) fn create_node_with(
        &mut self,
        type_name: &str,
        name: &str,
        parent: Option<NodeId>,
        spec: NodeSpec,
    ) -> RenderSetupResult<NodeId> {
        validate_name(name)?;
        let dag = self.types.is_dag(type_name);
        if let Some(p) = parent {
            if !dag {
                return Err(RenderSetupError::scene(format!(
                    "'{type_name}' is not a DAG type and cannot have a parent"
                )));
            }
            if !self.is_dag(p) {
                return Err(RenderSetupError::scene(format!("parent {p} is not a DAG node")));
            }
        }
        let final_name = if spec.exact_name {
            if self.name_taken(name, dag, parent, None) {
                return Err(RenderSetupError::scene(format!("node name '{name}' is taken")));
            }
            name.to_owned()
        } else {
            self.uniquify(name, dag, parent, None)
        };

        let id = NodeId(self.next_id);
        self.next_id += 1;

        let mut attrs = BTreeMap::new();
        attrs.insert(
            "message".to_owned(),
            Attribute {
                ty: PlugType::Message,
                value: PlugValue::Message,
            },
        );
        for t in self.types.attributes(type_name) {
            attrs.insert(
                t.name.clone(),
                Attribute {
                    ty: t.ty,
                    value: t.default.clone(),
                },
            );
        }

        self.nodes.insert(
            id,
            Node {
                id,
                name: final_name,
                type_name: type_name.to_owned(),
                parent,
                children: Vec::new(),
                attrs,
                internal: spec.internal,
                reference: spec.reference,
                compute: spec.compute,
            },
        );
        if let Some(p) = parent
            && let Some(pn) = self.nodes.get_mut(&p)
        {
            pn.children.push(id);
        }

        self.emit(SceneEvent::NodeAdded {
            node: id,
            path: self.full_path(id),
            internal: spec.internal,
        });
        Ok(id)
    }

    fn name_taken(
        &self,
        name: &str,
        dag: bool,
        parent: Option<NodeId>,
        except: Option<NodeId>,
    ) -> bool {
        self.nodes.values().any(|n| {
            if Some(n.id) == except || n.name != name {
                return false;
            }
            // DG names are global; DAG names are unique among siblings and against DG names.
            if !dag {
                return true;
            }
            !self.types.is_dag(&n.type_name) || n.parent == parent
        })
    }

    fn uniquify(
        &self,
        name: &str,
        dag: bool,
        parent: Option<NodeId>,
        except: Option<NodeId>,
    ) -> String {
        if !self.name_taken(name, dag, parent, except) {
            return name.to_owned();
        }
        let (base, num) = split_trailing_number(name);
        let mut n = num.map(|n| n + 1).unwrap_or(1);
        loop {
            let candidate = format!("{base}{n}");
            if !self.name_taken(&candidate, dag, parent, except) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Delete a node, its DAG descendants, and every connection touching them.
    pub fn delete_node(&mut self, id: NodeId) -> RenderSetupResult<()> {
        self.node_or_err(id)?;
        let mut doomed = self.dag_descendants(id);
        doomed.reverse();
        doomed.push(id);

        for n in doomed {
            let plugs: Vec<(Plug, Plug)> = self
                .inputs
                .iter()
                .filter(|(dst, src)| dst.node == n || src.node == n)
                .map(|(dst, src)| (src.clone(), dst.clone()))
                .collect();
            for (src, dst) in plugs {
                self.disconnect(&src, &dst)?;
            }

            let path = self.full_path(n);
            let Some(node) = self.nodes.remove(&n) else {
                continue;
            };
            if let Some(p) = node.parent
                && let Some(pn) = self.nodes.get_mut(&p)
            {
                pn.children.retain(|c| *c != n);
            }
            self.emit(SceneEvent::NodeRemoved {
                node: n,
                path,
                internal: node.internal,
            });
        }
        Ok(())
    }

    /// Rename a node. Returns the final (possibly uniquified) name.
    pub fn rename_node(&mut self, id: NodeId, name: &str) -> RenderSetupResult<String> {
        validate_name(name)?;
        let node = self.node_or_err(id)?;
        let dag = self.types.is_dag(&node.type_name);
        let parent = node.parent;
        let internal = node.internal;
        let final_name = self.uniquify(name, dag, parent, Some(id));
        let old_path = self.full_path(id);
        if let Some(n) = self.nodes.get_mut(&id) {
            n.name = final_name.clone();
        }
        self.emit(SceneEvent::NodeRenamed {
            node: id,
            old_path,
            new_path: self.full_path(id),
            internal,
        });
        Ok(final_name)
    }

    /// Move a DAG node under `parent` (or to the root).
    pub fn reparent_node(&mut self, id: NodeId, parent: Option<NodeId>) -> RenderSetupResult<()> {
        if !self.is_dag(id) {
            return Err(RenderSetupError::scene(format!("{id} is not a DAG node")));
        }
        if let Some(p) = parent {
            if !self.is_dag(p) {
                return Err(RenderSetupError::scene(format!("parent {p} is not a DAG node")));
            }
            if p == id || self.dag_descendants(id).contains(&p) {
                return Err(RenderSetupError::scene(
                    "cannot parent a node under itself or its descendant",
                ));
            }
        }
        let node = self.node_or_err(id)?;
        let old_parent = node.parent;
        let internal = node.internal;
        let name = node.name.clone();
        let old_path = self.full_path(id);

        let final_name = self.uniquify(&name, true, parent, Some(id));
        if let Some(op) = old_parent
            && let Some(pn) = self.nodes.get_mut(&op)
        {
            pn.children.retain(|c| *c != id);
        }
        if let Some(p) = parent
            && let Some(pn) = self.nodes.get_mut(&p)
        {
            pn.children.push(id);
        }
        if let Some(n) = self.nodes.get_mut(&id) {
            n.parent = parent;
            n.name = final_name;
        }
        self.emit(SceneEvent::NodeReparented {
            node: id,
            old_path,
            new_path: self.full_path(id),
            internal,
        });
        Ok(())
    }

    /// DAG descendants in pre-order (the node itself excluded).
    pub fn dag_descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.nodes.get(&id) {
            Some(n) => n.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(n) = stack.pop() {
            out.push(n);
            if let Some(node) = self.nodes.get(&n) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    // ---- names and paths ---------------------------------------------------------------------

    /// Full path: `|group1|pSphere1` for DAG nodes, the bare name for DG nodes.
    pub fn full_path(&self, id: NodeId) -> String {
        let Some(node) = self.nodes.get(&id) else {
            return String::new();
        };
        if !self.types.is_dag(&node.type_name) {
            return node.name.clone();
        }
        let mut segments = vec![node.name.as_str()];
        let mut cur = node.parent;
        while let Some(p) = cur {
            let Some(pn) = self.nodes.get(&p) else {
                break;
            };
            segments.push(pn.name.as_str());
            cur = pn.parent;
        }
        segments.reverse();
        let mut s = String::new();
        for seg in segments {
            s.push('|');
            s.push_str(seg);
        }
        s
    }

    /// Leaf name.
    pub fn leaf_name(&self, id: NodeId) -> &str {
        self.nodes.get(&id).map(|n| n.name.as_str()).unwrap_or("")
    }

    /// Shortest partial path that names the node unambiguously.
    pub fn unique_name(&self, id: NodeId) -> String {
        let full = self.full_path(id);
        if !self.is_dag(id) {
            return full;
        }
        let segments: Vec<&str> = full.trim_start_matches('|').split('|').collect();
        for take in 1..=segments.len() {
            let partial = segments[segments.len() - take..].join("|");
            if self.resolve_all(&partial).len() == 1 {
                return partial;
            }
        }
        full
    }

    /// All nodes a name resolves to: exact full path (`|a|b`), partial path suffix (`a|b`), or
    /// leaf name.
    fn resolve_all(&self, name: &str) -> Vec<NodeId> {
        if name.starts_with('|') {
            return self
                .nodes
                .keys()
                .copied()
                .filter(|id| self.is_dag(*id) && self.full_path(*id) == name)
                .collect();
        }
        if name.contains('|') {
            let suffix = format!("|{name}");
            return self
                .nodes
                .keys()
                .copied()
                .filter(|id| self.is_dag(*id) && self.full_path(*id).ends_with(&suffix))
                .collect();
        }
        self.nodes
            .values()
            .filter(|n| n.name == name)
            .map(|n| n.id)
            .collect()
    }

    /// Resolve a node name or path. `None` when missing or ambiguous.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        let all = self.resolve_all(name);
        if all.len() == 1 { Some(all[0]) } else { None }
    }

    /// Resolve a node name or path, with a descriptive error.
    pub fn resolve(&self, name: &str) -> RenderSetupResult<NodeId> {
        let all = self.resolve_all(name);
        match all.len() {
            0 => Err(RenderSetupError::scene(format!("no node named '{name}'"))),
            1 => Ok(all[0]),
            n => Err(RenderSetupError::scene(format!(
                "'{name}' is ambiguous ({n} matches)"
            ))),
        }
    }

    /// Parse `node.attr` into a plug. The attribute must exist.
    pub fn plug(&self, path: &str) -> RenderSetupResult<Plug> {
        let (node, attr) = path
            .rsplit_once('.')
            .ok_or_else(|| RenderSetupError::scene(format!("'{path}' is not a node.attr path")))?;
        let id = self.resolve(node)?;
        let p = Plug::new(id, attr);
        if self.attribute(&p).is_none() {
            return Err(RenderSetupError::scene(format!(
                "node '{node}' has no attribute '{attr}'"
            )));
        }
        Ok(p)
    }

    // ---- attributes and values ---------------------------------------------------------------

    /// Add a dynamic attribute.
    pub fn add_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        ty: PlugType,
        value: Option<PlugValue>,
    ) -> RenderSetupResult<()> {
        if ty == PlugType::Invalid || name.is_empty() {
            return Err(RenderSetupError::scene("attribute needs a name and a valid type"));
        }
        let value = match value {
            Some(v) => v.coerce(ty)?,
            None => PlugValue::default_for(ty)
                .ok_or_else(|| RenderSetupError::scene(format!("no default for {ty}")))?,
        };
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| RenderSetupError::scene(format!("unknown node {id}")))?;
        if node.attrs.contains_key(name) {
            return Err(RenderSetupError::scene(format!(
                "attribute '{name}' already exists on '{}'",
                node.name
            )));
        }
        node.attrs.insert(name.to_owned(), Attribute { ty, value });
        Ok(())
    }

    /// Look up an attribute.
    pub fn attribute(&self, plug: &Plug) -> Option<&Attribute> {
        self.nodes.get(&plug.node)?.attrs.get(&plug.attr)
    }

    /// Stored value, ignoring any input connection.
    pub fn stored_value(&self, plug: &Plug) -> RenderSetupResult<&PlugValue> {
        self.attribute(plug)
            .map(|a| &a.value)
            .ok_or_else(|| RenderSetupError::scene(format!("no such plug '{}'", plug.name(self))))
    }

    /// Write a value (coerced to the attribute type). Fails on connected plugs.
    pub fn set_value(&mut self, plug: &Plug, value: PlugValue) -> RenderSetupResult<()> {
        if self.inputs.contains_key(plug) {
            return Err(RenderSetupError::scene(format!(
                "'{}' has an input connection",
                plug.name(self)
            )));
        }
        self.record_reference_edit(plug.node, |s| format!("setAttr {}", plug.name(s)));
        self.write_stored(plug, value)
    }

    /// Write the stored value even when the plug is connected.
    pub(crate) fn write_stored(&mut self, plug: &Plug, value: PlugValue) -> RenderSetupResult<()> {
        let name = plug.name(self);
        let attr = self
            .nodes
            .get_mut(&plug.node)
            .and_then(|n| n.attrs.get_mut(&plug.attr))
            .ok_or_else(|| RenderSetupError::scene(format!("no such plug '{name}'")))?;
        attr.value = value.coerce(attr.ty)?;
        Ok(())
    }

    /// Effective value of a plug.
    pub fn evaluate(&self, plug: &Plug) -> RenderSetupResult<PlugValue> {
        self.evaluate_at(plug, 0)
    }

    pub(crate) fn evaluate_at(&self, plug: &Plug, depth: usize) -> RenderSetupResult<PlugValue> {
        if depth > MAX_EVAL_DEPTH {
            return Err(RenderSetupError::scene(format!(
                "evaluation cycle through '{}'",
                plug.name(self)
            )));
        }
        let attr = self.attribute(plug).ok_or_else(|| {
            RenderSetupError::scene(format!("no such plug '{}'", plug.name(self)))
        })?;
        if let Some(src) = self.inputs.get(plug) {
            return self.evaluate_at(src, depth + 1)?.coerce(attr.ty);
        }
        if plug.attr == apply_node::OUT
            && let Some(kind) = self.nodes.get(&plug.node).and_then(|n| n.compute)
        {
            return apply_node::compute(self, plug.node, kind, depth + 1)?.coerce(attr.ty);
        }
        Ok(attr.value.clone())
    }

    // ---- connections -------------------------------------------------------------------------

    /// Input connection of a plug.
    pub fn input(&self, plug: &Plug) -> Option<&Plug> {
        self.inputs.get(plug)
    }

    /// Plugs driven by `plug`, sorted.
    pub fn outputs(&self, plug: &Plug) -> Vec<Plug> {
        self.outputs
            .get(plug)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Connect `src -> dst`. The destination must not already have an input.
    pub fn connect(&mut self, src: &Plug, dst: &Plug) -> RenderSetupResult<()> {
        let src_ty = src.ty(self)?;
        let dst_ty = dst.ty(self)?;
        if src == dst {
            return Err(RenderSetupError::scene("cannot connect a plug to itself"));
        }
        if !dst_ty.accepts(src_ty) {
            return Err(RenderSetupError::type_mismatch(format!(
                "cannot connect {src_ty} '{}' to {dst_ty} '{}'",
                src.name(self),
                dst.name(self)
            )));
        }
        if let Some(existing) = self.inputs.get(dst) {
            return Err(RenderSetupError::scene(format!(
                "'{}' is already connected from '{}'",
                dst.name(self),
                existing.name(self)
            )));
        }
        self.record_reference_edit(dst.node, |s| {
            format!("connectAttr {} {}", src.name(s), dst.name(s))
        });
        self.inputs.insert(dst.clone(), src.clone());
        self.outputs
            .entry(src.clone())
            .or_default()
            .insert(dst.clone());
        let internal = self.is_internal(src.node) && self.is_internal(dst.node);
        self.emit(SceneEvent::ConnectionChanged {
            src: src.clone(),
            dst: dst.clone(),
            connected: true,
            internal,
        });
        Ok(())
    }

    /// Break `src -> dst`.
    pub fn disconnect(&mut self, src: &Plug, dst: &Plug) -> RenderSetupResult<()> {
        if self.inputs.get(dst) != Some(src) {
            return Err(RenderSetupError::scene(format!(
                "'{}' is not connected to '{}'",
                src.name(self),
                dst.name(self)
            )));
        }
        self.record_reference_edit(dst.node, |s| {
            format!("disconnectAttr {} {}", src.name(s), dst.name(s))
        });
        self.inputs.remove(dst);
        if let Some(set) = self.outputs.get_mut(src) {
            set.remove(dst);
            if set.is_empty() {
                self.outputs.remove(src);
            }
        }
        let internal = self.is_internal(src.node) && self.is_internal(dst.node);
        self.emit(SceneEvent::ConnectionChanged {
            src: src.clone(),
            dst: dst.clone(),
            connected: false,
            internal,
        });
        Ok(())
    }

    fn is_internal(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(|n| n.internal)
    }

    /// Upstream plug that effectively drives `plug`, looking through connection-override nodes.
    ///
    /// Value-override nodes are reported as themselves since they produce a new value.
    pub fn effective_source(&self, plug: &Plug) -> Option<Plug> {
        let mut src = self.inputs.get(plug)?.clone();
        for _ in 0..MAX_EVAL_DEPTH {
            let kind = self.nodes.get(&src.node).and_then(|n| n.compute);
            if src.attr != apply_node::OUT || kind != Some(ApplyKind::Connection) {
                return Some(src);
            }
            let enabled = matches!(
                self.attribute(&Plug::new(src.node, apply_node::ENABLED))
                    .map(|a| &a.value),
                Some(PlugValue::Bool(true))
            );
            let through = Plug::new(
                src.node,
                if enabled {
                    apply_node::TARGET
                } else {
                    apply_node::ORIGINAL
                },
            );
            src = self.inputs.get(&through)?.clone();
        }
        None
    }

    /// Shading engine assigned to a shape, if any.
    pub fn assigned_shading_engine(&self, shape: NodeId) -> Option<NodeId> {
        let src = self.effective_source(&Plug::new(shape, "shadingEngine"))?;
        self.has_category(src.node, NodeCategory::ShadingEngine)
            .then_some(src.node)
    }

    /// Surface shader driving a shading engine, if any.
    pub fn surface_shader(&self, shading_engine: NodeId) -> Option<NodeId> {
        self.effective_source(&Plug::new(shading_engine, "surfaceShader"))
            .map(|p| p.node)
    }

    // ---- events and references ---------------------------------------------------------------

    fn emit(&mut self, event: SceneEvent) {
        self.events.push(Pending::Event(event));
    }

    /// Mark the start of a bulk load. Events queued until the matching [`Self::end_load`] are
    /// not delivered to listeners.
    pub(crate) fn begin_load(&mut self) {
        self.events.push(Pending::LoadBegin);
    }

    pub(crate) fn end_load(&mut self) {
        self.events.push(Pending::LoadEnd);
    }

    /// Drain pending change events in emission order.
    pub fn take_events(&mut self) -> Vec<SceneEvent> {
        self.take_pending()
            .into_iter()
            .filter_map(|p| match p {
                Pending::Event(e) => Some(e),
                Pending::LoadBegin | Pending::LoadEnd => None,
            })
            .collect()
    }

    /// Drain the queue including load markers.
    pub(crate) fn take_pending(&mut self) -> Vec<Pending> {
        std::mem::take(&mut self.events)
    }

    /// Return `true` when change events are waiting to be drained.
    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Switch recording of edits to referenced nodes off (`true`) or on.
    pub fn set_ignore_reference_edits(&mut self, ignore: bool) {
        self.ignore_reference_edits = ignore;
    }

    /// Current state of the reference-edit switch.
    pub fn ignores_reference_edits(&self) -> bool {
        self.ignore_reference_edits
    }

    /// Edits recorded against referenced nodes.
    pub fn reference_edits(&self) -> &[ReferenceEdit] {
        &self.reference_edits
    }

    fn record_reference_edit(&mut self, id: NodeId, describe: impl FnOnce(&Self) -> String) {
        if self.ignore_reference_edits {
            return;
        }
        let Some(ns) = self.nodes.get(&id).and_then(|n| n.reference.clone()) else {
            return;
        };
        let edit = describe(self);
        self.reference_edits.push(ReferenceEdit {
            namespace: ns,
            edit,
        });
    }

    /// Create a reference to `contents` under `namespace` and load it.
    pub fn create_reference(
        &mut self,
        namespace: &str,
        contents: SceneSnapshot,
    ) -> RenderSetupResult<()> {
        validate_name(namespace)?;
        if self.references.contains_key(namespace) {
            return Err(RenderSetupError::scene(format!(
                "reference namespace '{namespace}' already exists"
            )));
        }
        self.references.insert(
            namespace.to_owned(),
            ReferenceState {
                loaded: false,
                contents,
            },
        );
        self.emit(SceneEvent::ReferenceCreated {
            namespace: namespace.to_owned(),
        });
        self.load_reference(namespace)
    }

    /// Load a reference's nodes (no-op when already loaded).
    pub fn load_reference(&mut self, namespace: &str) -> RenderSetupResult<()> {
        let state = self.references.get(namespace).ok_or_else(|| {
            RenderSetupError::scene(format!("unknown reference '{namespace}'"))
        })?;
        if state.loaded {
            return Ok(());
        }
        let contents = state.contents.clone();
        self.begin_load();
        let imported = self.import_snapshot(&contents, Some(namespace));
        self.end_load();
        imported?;
        if let Some(s) = self.references.get_mut(namespace) {
            s.loaded = true;
        }
        self.emit(SceneEvent::ReferenceLoaded {
            namespace: namespace.to_owned(),
        });
        Ok(())
    }

    /// Unload a reference's nodes, keeping the reference itself.
    pub fn unload_reference(&mut self, namespace: &str) -> RenderSetupResult<()> {
        let state = self.references.get(namespace).ok_or_else(|| {
            RenderSetupError::scene(format!("unknown reference '{namespace}'"))
        })?;
        if !state.loaded {
            return Ok(());
        }
        let roots: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.reference.as_deref() == Some(namespace))
            .filter(|n| {
                n.parent.is_none_or(|p| {
                    self.nodes
                        .get(&p)
                        .is_none_or(|pn| pn.reference.as_deref() != Some(namespace))
                })
            })
            .map(|n| n.id)
            .collect();
        self.begin_load();
        let deleted = self.delete_roots(roots);
        self.end_load();
        deleted?;
        if let Some(s) = self.references.get_mut(namespace) {
            s.loaded = false;
        }
        self.emit(SceneEvent::ReferenceUnloaded {
            namespace: namespace.to_owned(),
        });
        Ok(())
    }

    fn delete_roots(&mut self, roots: Vec<NodeId>) -> RenderSetupResult<()> {
        for r in roots {
            if self.nodes.contains_key(&r) {
                self.delete_node(r)?;
            }
        }
        Ok(())
    }

    /// Unload and forget a reference.
    pub fn remove_reference(&mut self, namespace: &str) -> RenderSetupResult<()> {
        self.unload_reference(namespace)?;
        self.references.remove(namespace);
        self.reference_edits.retain(|e| e.namespace != namespace);
        self.emit(SceneEvent::ReferenceRemoved {
            namespace: namespace.to_owned(),
        });
        Ok(())
    }

    /// Namespaces of known references and whether they are loaded.
    pub fn references(&self) -> Vec<(String, bool)> {
        self.references
            .iter()
            .map(|(ns, s)| (ns.clone(), s.loaded))
            .collect()
    }

    // ---- snapshots ---------------------------------------------------------------------------

    /// Serializable copy of the whole graph, internal nodes included, in a canonical order.
    pub fn snapshot(&self) -> SceneSnapshot {
        let mut nodes = Vec::new();
        let mut roots: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| self.types.is_dag(&n.type_name) && n.parent.is_none())
            .collect();
        roots.sort_by(|a, b| a.name.cmp(&b.name));
        for r in roots {
            nodes.push(self.node_snapshot(r.id));
            for d in self.dag_descendants(r.id) {
                nodes.push(self.node_snapshot(d));
            }
        }
        let mut dg: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| !self.types.is_dag(&n.type_name))
            .collect();
        dg.sort_by(|a, b| a.name.cmp(&b.name));
        for n in dg {
            nodes.push(self.node_snapshot(n.id));
        }

        let mut connections: Vec<ConnectionSnapshot> = self
            .inputs
            .iter()
            .map(|(dst, src)| ConnectionSnapshot {
                src: format!("{}.{}", self.full_path(src.node), src.attr),
                dst: format!("{}.{}", self.full_path(dst.node), dst.attr),
            })
            .collect();
        connections.sort();
        SceneSnapshot { nodes, connections }
    }

    fn node_snapshot(&self, id: NodeId) -> NodeSnapshot {
        let n = &self.nodes[&id];
        NodeSnapshot {
            path: self.full_path(id),
            type_name: n.type_name.clone(),
            internal: n.internal,
            compute: n.compute,
            attributes: n
                .attrs
                .iter()
                .map(|(k, a)| (k.clone(), a.value.clone()))
                .collect(),
        }
    }

    /// What the scene evaluates to: engine-owned nodes and their connections dropped, every
    /// remaining attribute holding its effective value.
    pub fn evaluated_snapshot(&self) -> RenderSetupResult<SceneSnapshot> {
        let mut snap = self.snapshot().without_internal();
        for ns in &mut snap.nodes {
            let id = self.resolve(&ns.path)?;
            for (attr, value) in ns.attributes.iter_mut() {
                *value = self.evaluate(&Plug::new(id, attr.clone()))?;
            }
        }
        Ok(snap)
    }

    /// Build a scene from a snapshot with the built-in type registry.
    pub fn from_snapshot(snapshot: &SceneSnapshot) -> RenderSetupResult<Self> {
        let mut scene = Self::new();
        scene.import_snapshot(snapshot, None)?;
        Ok(scene)
    }

    /// Create every node and connection of `snapshot`, prefixing names with `namespace:`.
    pub(crate) fn import_snapshot(
        &mut self,
        snapshot: &SceneSnapshot,
        namespace: Option<&str>,
    ) -> RenderSetupResult<Vec<NodeId>> {
        let prefix = |seg: &str| match namespace {
            Some(ns) => format!("{ns}:{seg}"),
            None => seg.to_owned(),
        };
        let map_path = |path: &str| -> String {
            if let Some(rest) = path.strip_prefix('|') {
                rest.split('|')
                    .map(|seg| format!("|{}", prefix(seg)))
                    .collect::<String>()
            } else {
                prefix(path)
            }
        };

        let mut created = Vec::new();
        for ns in &snapshot.nodes {
            let path = map_path(&ns.path);
            let (parent, leaf) = match path.strip_prefix('|') {
                Some(rest) => match rest.rsplit_once('|') {
                    Some((parent_path, leaf)) => {
                        let parent = self.find(&format!("|{parent_path}")).ok_or_else(|| {
                            RenderSetupError::scene(format!(
                                "parent of '{path}' must precede it in the snapshot"
                            ))
                        })?;
                        (Some(parent), leaf.to_owned())
                    }
                    None => (None, rest.to_owned()),
                },
                None => (None, path.clone()),
            };
            let id = self.create_node_with(
                &ns.type_name,
                &leaf,
                parent,
                NodeSpec {
                    internal: ns.internal,
                    reference: namespace.map(str::to_owned),
                    compute: ns.compute,
                    exact_name: true,
                },
            )?;
            if let Some(node) = self.nodes.get_mut(&id) {
                for (name, value) in &ns.attributes {
                    match node.attrs.get_mut(name) {
                        Some(attr) => attr.value = value.coerce(attr.ty)?,
                        None => {
                            node.attrs.insert(
                                name.clone(),
                                Attribute {
                                    ty: value.ty(),
                                    value: value.clone(),
                                },
                            );
                        }
                    }
                }
            }
            created.push(id);
        }

        let was_ignoring = self.ignore_reference_edits;
        self.ignore_reference_edits = true;
        let result = snapshot.connections.iter().try_for_each(|c| {
            let src = self.plug(&map_path(&c.src))?;
            let dst = self.plug(&map_path(&c.dst))?;
            self.connect(&src, &dst)
        });
        self.ignore_reference_edits = was_ignoring;
        result?;
        Ok(created)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/graph.rs"]
mod tests;
