//! The kind catalog: per-kind schemas for every block the model understands.
//!
//! A [`KindSpec`] declares a kind's mode, its static socket layout, its
//! inline fields with defaults, the type-set its output carries, and which
//! shape mutator (if any) governs its dynamic layout. The built-in catalog
//! covers the full translated language surface; hosts may register further
//! kinds at runtime, e.g. stage-specific actor commands.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    graph::{FieldValue, Socket, SocketRole},
    types::{SlotType, TypeSet},
};

/// Canonical kind names. Everything the parser builds and the generator
/// walks is one of these or a host-registered extension.
pub mod kinds {
    pub const VARIABLE_DECLARE: &str = "variable_declare";
    pub const VARIABLE_SET: &str = "variable_set";
    pub const IF_BLOCK: &str = "if_block";
    pub const WHILE_BLOCK: &str = "while_block";
    pub const REPEAT_BLOCK: &str = "repeat_block";
    pub const FOR_EACH_BLOCK: &str = "for_each_block";
    pub const TRY_BLOCK: &str = "try_block";
    pub const RETURN_STATEMENT: &str = "return_statement";
    pub const YIELD_STATEMENT: &str = "yield_statement";
    pub const BREAK_STATEMENT: &str = "break_statement";
    pub const CONTINUE_STATEMENT: &str = "continue_statement";
    pub const THROW_STATEMENT: &str = "throw_statement";
    pub const PROCEDURE_DEFINE: &str = "procedure_define";
    pub const PROCEDURE_CALL: &str = "procedure_call";
    pub const SAY: &str = "say";
    pub const MOVE_TO: &str = "move_to";
    pub const PLAY_SOUND: &str = "play_sound";
    pub const SET_BACKGROUND: &str = "set_background";
    pub const WAIT: &str = "wait";

    pub const NUMBER_LITERAL: &str = "number_literal";
    pub const STRING_LITERAL: &str = "string_literal";
    pub const BOOLEAN_LITERAL: &str = "boolean_literal";
    pub const NULL_LITERAL: &str = "null_literal";
    pub const VARIABLE_GET: &str = "variable_get";
    pub const ARITHMETIC: &str = "arithmetic";
    pub const COMPARISON: &str = "comparison";
    pub const LOGICAL: &str = "logical";
    pub const LOGIC_NOT: &str = "logic_not";
    pub const NUMERIC_NEGATE: &str = "numeric_negate";
    pub const NUMERIC_PLUS: &str = "numeric_plus";
    pub const COLLECTION_LITERAL: &str = "collection_literal";
    pub const MEMBER_ACCESS: &str = "member_access";
    pub const INDEX_ACCESS: &str = "index_access";
    pub const MATH_UNARY: &str = "math_unary";
    pub const MATH_BINARY: &str = "math_binary";
    pub const COERCE_NUMBER: &str = "coerce_number";
    pub const COERCE_STRING: &str = "coerce_string";
    pub const COLOR_RGB: &str = "color_rgb";
    pub const SPRITE_REF: &str = "sprite_ref";

    pub const BRANCH_ROOT_MARKER: &str = "branch_root_marker";
    pub const BRANCH_ELSE_IF_MARKER: &str = "branch_else_if_marker";
    pub const BRANCH_ELSE_MARKER: &str = "branch_else_marker";
    pub const PROCEDURE_PARAMS_ROOT: &str = "procedure_params_root";
    pub const PROCEDURE_PARAM_MARKER: &str = "procedure_param_marker";
}

/// `Math.<fn>` spellings accepted with one argument.
pub const MATH_UNARY_FUNCTIONS: &[&str] = &[
    "abs", "floor", "ceil", "round", "sqrt", "sin", "cos", "tan",
];

/// `Math.<fn>` spellings accepted with two arguments.
pub const MATH_BINARY_FUNCTIONS: &[&str] = &["pow", "min", "max", "atan2"];

/// How a kind participates in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindMode {
    /// Chainable, no output.
    Statement,
    /// Produces a value, cannot chain.
    Expression,
    /// A top-level definition: neither chainable nor a value.
    Definition,
    /// A procedure call site. Statement or expression depending on the
    /// bound signature's return type.
    DynamicCall,
    /// Marker nodes used by decompose/compose dialogs. Chainable among
    /// themselves, never rendered.
    Auxiliary,
}

/// Which shape mutator recomputes the kind's socket layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutatorKind {
    Branch,
    Collection,
    ProcedureDefine,
    ProcedureCall,
    ReturnValue,
}

/// How the generator renders the kind.
///
/// `Structural` kinds each have a bespoke emit rule; `ActorMethod` kinds
/// share the `this.<method>(...)` rule and drive the parser's method
/// whitelist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderRule {
    Structural,
    ActorMethod(&'static str),
}

#[derive(Debug, Clone)]
pub struct SocketSpec {
    pub name: &'static str,
    pub role: SocketRole,
    pub accepts: TypeSet,
}

impl SocketSpec {
    pub fn to_socket(&self) -> Socket {
        Socket {
            name: self.name.to_string(),
            role: self.role,
            accepts: self.accepts,
            connection: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub default: FieldValue,
}

/// Full schema for one node kind.
#[derive(Debug, Clone)]
pub struct KindSpec {
    pub name: &'static str,
    pub mode: KindMode,
    pub sockets: Vec<SocketSpec>,
    pub fields: Vec<FieldSpec>,
    pub output: TypeSet,
    pub mutator: Option<MutatorKind>,
    pub render: RenderRule,
}

impl KindSpec {
    pub fn statement(name: &'static str) -> KindSpec {
        KindSpec {
            name,
            mode: KindMode::Statement,
            sockets: Vec::new(),
            fields: Vec::new(),
            output: TypeSet::Anything,
            mutator: None,
            render: RenderRule::Structural,
        }
    }

    pub fn expression(name: &'static str, output: TypeSet) -> KindSpec {
        KindSpec {
            name,
            mode: KindMode::Expression,
            sockets: Vec::new(),
            fields: Vec::new(),
            output,
            mutator: None,
            render: RenderRule::Structural,
        }
    }

    pub fn auxiliary(name: &'static str) -> KindSpec {
        KindSpec {
            name,
            mode: KindMode::Auxiliary,
            sockets: Vec::new(),
            fields: Vec::new(),
            output: TypeSet::Anything,
            mutator: None,
            render: RenderRule::Structural,
        }
    }

    pub fn mode(mut self, mode: KindMode) -> KindSpec {
        self.mode = mode;
        self
    }

    /// Append a value socket.
    pub fn value(mut self, name: &'static str, accepts: TypeSet) -> KindSpec {
        self.sockets.push(SocketSpec {
            name,
            role: SocketRole::Value,
            accepts,
        });
        self
    }

    /// Append a sequence socket.
    pub fn body(mut self, name: &'static str) -> KindSpec {
        self.sockets.push(SocketSpec {
            name,
            role: SocketRole::Sequence,
            accepts: TypeSet::Anything,
        });
        self
    }

    /// Append a display-only marker row.
    pub fn marker(mut self, name: &'static str) -> KindSpec {
        self.sockets.push(SocketSpec {
            name,
            role: SocketRole::Marker,
            accepts: TypeSet::Anything,
        });
        self
    }

    pub fn field(mut self, name: &'static str, default: FieldValue) -> KindSpec {
        self.fields.push(FieldSpec { name, default });
        self
    }

    pub fn mutator(mut self, mutator: MutatorKind) -> KindSpec {
        self.mutator = Some(mutator);
        self
    }

    pub fn render(mut self, rule: RenderRule) -> KindSpec {
        self.render = rule;
        self
    }

    /// The fixed socket layout, instantiated. Kinds with a mutator extend
    /// or replace this through their shape state.
    pub fn static_sockets(&self) -> Vec<Socket> {
        self.sockets.iter().map(SocketSpec::to_socket).collect()
    }
}

/// Read-only supplier of the resource names a stage offers. Hosts implement
/// this over their asset store and inject it; the catalog never owns the
/// backing data, so the lists may change between calls.
pub trait ResourceCatalog: Send + Sync {
    fn sprite_names(&self) -> Vec<String>;
    fn sound_names(&self) -> Vec<String>;
}

/// Registry of node kinds, seeded with the built-in catalog.
#[derive(Default)]
pub struct NodeCatalog {
    specs: HashMap<String, KindSpec>,
    actor_methods: HashMap<String, String>,
    resources: Option<Arc<dyn ResourceCatalog>>,
}

impl fmt::Debug for NodeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCatalog")
            .field("kinds", &self.specs.len())
            .field("resources", &self.resources.is_some())
            .finish()
    }
}

impl NodeCatalog {
    /// A catalog holding every built-in kind.
    pub fn create() -> NodeCatalog {
        let mut catalog = NodeCatalog::default();
        for spec in builtin_specs() {
            catalog.register(spec);
        }
        info!(
            "[NodeCatalog::create] seeded {} built-in kinds",
            catalog.specs.len()
        );
        catalog
    }

    /// Install or replace a kind. Replacement logs; last write wins.
    pub fn register(&mut self, spec: KindSpec) {
        if self.specs.contains_key(spec.name) {
            warn!("[NodeCatalog::register] replacing kind '{}'", spec.name);
        }
        if let RenderRule::ActorMethod(method) = &spec.render {
            self.actor_methods
                .insert(method.to_string(), spec.name.to_string());
        }
        self.specs.insert(spec.name.to_string(), spec);
    }

    pub fn get(&self, kind: &str) -> Option<&KindSpec> {
        self.specs.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.specs.contains_key(kind)
    }

    /// The kind rendered as `this.<method>(...)`, if `method` is known.
    pub fn actor_kind(&self, method: &str) -> Option<&KindSpec> {
        self.actor_methods
            .get(method)
            .and_then(|kind| self.specs.get(kind))
    }

    /// Inject the host's resource supplier. A later call replaces it.
    pub fn attach_resources(&mut self, resources: Arc<dyn ResourceCatalog>) {
        if self.resources.is_some() {
            warn!("[NodeCatalog::attach_resources] replacing resource supplier");
        }
        self.resources = Some(resources);
    }

    /// The selectable values for a resource-backed field: sprite names for
    /// `sprite_ref`, sound names for `play_sound`. `None` for every other
    /// field, and for these two when no supplier is attached.
    pub fn field_choices(&self, kind: &str, field: &str) -> Option<Vec<String>> {
        let resources = self.resources.as_ref()?;
        match (kind, field) {
            (kinds::SPRITE_REF, "NAME") => Some(resources.sprite_names()),
            (kinds::PLAY_SOUND, "SOUND") => Some(resources.sound_names()),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &KindSpec> {
        self.specs.values()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

fn number() -> TypeSet {
    TypeSet::single(SlotType::Number)
}

fn boolean() -> TypeSet {
    TypeSet::single(SlotType::Boolean)
}

fn iterable() -> TypeSet {
    TypeSet::of(&[SlotType::Array, SlotType::String, SlotType::Iterable])
}

fn builtin_specs() -> Vec<KindSpec> {
    use kinds::*;
    vec![
        // Statements.
        KindSpec::statement(VARIABLE_DECLARE)
            .field("NAME", FieldValue::text(""))
            .field("TYPE", FieldValue::text("Any")),
        KindSpec::statement(VARIABLE_SET)
            .field("NAME", FieldValue::text(""))
            .value("VALUE", TypeSet::Anything),
        KindSpec::statement(IF_BLOCK)
            .value("COND", boolean())
            .body("THEN")
            .mutator(MutatorKind::Branch),
        KindSpec::statement(WHILE_BLOCK)
            .value("COND", boolean())
            .body("DO"),
        KindSpec::statement(REPEAT_BLOCK)
            .field("VAR", FieldValue::text("i"))
            .value("TIMES", number())
            .body("DO"),
        KindSpec::statement(FOR_EACH_BLOCK)
            .field("VAR", FieldValue::text("item"))
            .value("LIST", iterable())
            .body("DO"),
        KindSpec::statement(TRY_BLOCK)
            .field("ERROR", FieldValue::text("err"))
            .body("TRY")
            .body("CATCH")
            .body("FINALLY"),
        KindSpec::statement(RETURN_STATEMENT).mutator(MutatorKind::ReturnValue),
        KindSpec::statement(YIELD_STATEMENT).mutator(MutatorKind::ReturnValue),
        KindSpec::statement(BREAK_STATEMENT),
        KindSpec::statement(CONTINUE_STATEMENT),
        KindSpec::statement(THROW_STATEMENT).value("VALUE", TypeSet::Anything),
        KindSpec::statement(PROCEDURE_DEFINE)
            .mode(KindMode::Definition)
            .marker("PARAMS")
            .body("BODY")
            .mutator(MutatorKind::ProcedureDefine),
        KindSpec::statement(PROCEDURE_CALL)
            .mode(KindMode::DynamicCall)
            .mutator(MutatorKind::ProcedureCall),
        KindSpec::statement(SAY)
            .value("TEXT", TypeSet::Anything)
            .render(RenderRule::ActorMethod("say")),
        KindSpec::statement(MOVE_TO)
            .value("X", number())
            .value("Y", number())
            .render(RenderRule::ActorMethod("moveTo")),
        KindSpec::statement(PLAY_SOUND)
            .field("SOUND", FieldValue::text(""))
            .render(RenderRule::ActorMethod("playSound")),
        KindSpec::statement(SET_BACKGROUND)
            .value("COLOR", TypeSet::single(SlotType::Color))
            .render(RenderRule::ActorMethod("setBackground")),
        KindSpec::statement(WAIT)
            .value("SECONDS", number())
            .render(RenderRule::ActorMethod("wait")),
        // Expressions.
        KindSpec::expression(NUMBER_LITERAL, number()).field("VALUE", FieldValue::Number(0.0)),
        KindSpec::expression(STRING_LITERAL, TypeSet::single(SlotType::String))
            .field("VALUE", FieldValue::text("")),
        KindSpec::expression(BOOLEAN_LITERAL, boolean()).field("VALUE", FieldValue::Flag(false)),
        KindSpec::expression(NULL_LITERAL, TypeSet::Anything),
        KindSpec::expression(VARIABLE_GET, TypeSet::Anything).field("NAME", FieldValue::text("")),
        KindSpec::expression(
            ARITHMETIC,
            TypeSet::of(&[SlotType::Number, SlotType::String]),
        )
        .field("OP", FieldValue::text("+"))
        .value("A", number())
        .value("B", number()),
        KindSpec::expression(COMPARISON, boolean())
            .field("OP", FieldValue::text("=="))
            .value("A", TypeSet::Anything)
            .value("B", TypeSet::Anything),
        KindSpec::expression(LOGICAL, boolean())
            .field("OP", FieldValue::text("&&"))
            .value("A", boolean())
            .value("B", boolean()),
        KindSpec::expression(LOGIC_NOT, boolean()).value("VALUE", boolean()),
        KindSpec::expression(NUMERIC_NEGATE, number()).value("VALUE", number()),
        KindSpec::expression(NUMERIC_PLUS, number()).value("VALUE", number()),
        KindSpec::expression(COLLECTION_LITERAL, TypeSet::single(SlotType::Array))
            .mutator(MutatorKind::Collection),
        KindSpec::expression(MEMBER_ACCESS, TypeSet::Anything)
            .field("PROPERTY", FieldValue::text(""))
            .value("OBJECT", TypeSet::Anything),
        KindSpec::expression(INDEX_ACCESS, TypeSet::Anything)
            .value("OBJECT", iterable())
            .value("INDEX", number()),
        KindSpec::expression(MATH_UNARY, number())
            .field("FN", FieldValue::text("abs"))
            .value("ARG", number()),
        KindSpec::expression(MATH_BINARY, number())
            .field("FN", FieldValue::text("pow"))
            .value("A", number())
            .value("B", number()),
        KindSpec::expression(COERCE_NUMBER, number()).value("VALUE", TypeSet::Anything),
        KindSpec::expression(COERCE_STRING, TypeSet::single(SlotType::String))
            .value("VALUE", TypeSet::Anything),
        KindSpec::expression(COLOR_RGB, TypeSet::single(SlotType::Color))
            .value("R", number())
            .value("G", number())
            .value("B", number()),
        KindSpec::expression(SPRITE_REF, TypeSet::single(SlotType::Sprite))
            .field("NAME", FieldValue::text("")),
        // Dialog markers.
        KindSpec::auxiliary(BRANCH_ROOT_MARKER).body("CLAUSES"),
        KindSpec::auxiliary(BRANCH_ELSE_IF_MARKER),
        KindSpec::auxiliary(BRANCH_ELSE_MARKER),
        KindSpec::auxiliary(PROCEDURE_PARAMS_ROOT).body("PARAMS"),
        KindSpec::auxiliary(PROCEDURE_PARAM_MARKER)
            .field("NAME", FieldValue::text(""))
            .field("TYPE", FieldValue::text("Any")),
    ]
}
