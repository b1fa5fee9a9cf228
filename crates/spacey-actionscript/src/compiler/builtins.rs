//! Static lookup tables: built-in functions, named constants and clip
//! property codes.
//!
//! Tables are built once on first use and never change afterwards.

use std::sync::LazyLock;

use rustc_hash::FxHashMap;

use crate::ast::{NodeId, NodeKind, Payload, Tree};
use crate::compiler::bytecode::OpCode;

/// A built-in function known to the lowering engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Builtin {
    /// Name in its canonical spelling
    pub name: &'static str,
    /// Fewest accepted arguments
    pub min_args: usize,
    /// Most accepted arguments
    pub max_args: usize,
    /// How calls are lowered
    pub rule: Rule,
}

impl Builtin {
    /// Whether a call leaves a value on the stack.
    pub fn yields_value(&self) -> bool {
        match self.rule {
            Rule::Opcode { yields, .. } => yields,
            Rule::Reversed(_) => false,
            Rule::Navigation(nav) => nav == Navigation::GetProperty,
            Rule::ByName => true,
        }
    }

    /// Whether `count` arguments are accepted.
    pub fn accepts(&self, count: usize) -> bool {
        (self.min_args..=self.max_args).contains(&count)
    }
}

/// Code generation rule for a built-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Arguments in source order, then one action
    Opcode {
        /// The action
        op: OpCode,
        /// Whether the action pushes a result
        yields: bool,
    },
    /// Arguments pushed in reverse of source order, then one action
    Reversed(OpCode),
    /// Timeline, URL and clip built-ins with literal special cases
    Navigation(Navigation),
    /// Ordinary call by name
    ByName,
}

/// Built-ins lowered to navigation or clip actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// `getURL(url[, window[, method]])`
    GetUrl,
    /// `loadMovie(url, target[, method])`
    LoadMovie,
    /// `loadMovieNum(url, level[, method])`
    LoadMovieNum,
    /// `unloadMovie(target)`
    UnloadMovie,
    /// `unloadMovieNum(level)`
    UnloadMovieNum,
    /// `loadVariables(url, target[, method])`
    LoadVariables,
    /// `loadVariablesNum(url, level[, method])`
    LoadVariablesNum,
    /// `fscommand(command[, args])`
    FsCommand,
    /// `gotoAndPlay(frame)` / `gotoAndStop(frame)`
    Goto {
        /// Keep playing after the jump
        play: bool,
    },
    /// `setTarget(path)`
    SetTarget,
    /// `duplicateMovieClip(source, name, depth)`
    DuplicateClip,
    /// `getProperty(target, property)`
    GetProperty,
    /// `setProperty(target, property, value)`
    SetProperty,
}

/// Depth offset applied to `duplicateMovieClip` depths.
pub const CLIP_DEPTH_OFFSET: i32 = 16384;

/// URL prefix that routes `fscommand` through `getURL`.
pub const FSCOMMAND_PREFIX: &str = "FSCommand:";

/// Target prefix for numbered levels.
pub const LEVEL_PREFIX: &str = "_level";

/// `GetUrl2` flag: send variables with GET.
pub const URL_METHOD_GET: u8 = 0x01;

/// `GetUrl2` flag: send variables with POST.
pub const URL_METHOD_POST: u8 = 0x02;

/// `GetUrl2` flag: the target names a clip rather than a window.
pub const URL_LOAD_TARGET: u8 = 0x40;

/// `GetUrl2` flag: load variables instead of a movie.
pub const URL_LOAD_VARIABLES: u8 = 0x80;

const fn op(name: &'static str, args: usize, op: OpCode, yields: bool) -> Builtin {
    Builtin {
        name,
        min_args: args,
        max_args: args,
        rule: Rule::Opcode { op, yields },
    }
}

const fn nav(name: &'static str, min_args: usize, max_args: usize, nav: Navigation) -> Builtin {
    Builtin {
        name,
        min_args,
        max_args,
        rule: Rule::Navigation(nav),
    }
}

const fn by_name(name: &'static str, min_args: usize, max_args: usize) -> Builtin {
    Builtin {
        name,
        min_args,
        max_args,
        rule: Rule::ByName,
    }
}

const BUILTIN_LIST: &[Builtin] = &[
    // Timeline control
    op("play", 0, OpCode::Play, false),
    op("stop", 0, OpCode::Stop, false),
    op("nextFrame", 0, OpCode::NextFrame, false),
    op("prevFrame", 0, OpCode::PrevFrame, false),
    op("toggleHighQuality", 0, OpCode::ToggleQuality, false),
    op("stopAllSounds", 0, OpCode::StopSounds, false),
    op("stopDrag", 0, OpCode::EndDrag, false),
    op("call", 1, OpCode::Call, false),
    op("removeMovieClip", 1, OpCode::RemoveSprite, false),
    op("trace", 1, OpCode::Trace, false),
    // Value functions
    op("getTimer", 0, OpCode::GetTime, true),
    op("random", 1, OpCode::RandomNumber, true),
    op("int", 1, OpCode::ToInteger, true),
    op("Number", 1, OpCode::ToNumber, true),
    op("String", 1, OpCode::ToString, true),
    op("typeof", 1, OpCode::TypeOf, true),
    op("length", 1, OpCode::StringLength, true),
    op("ord", 1, OpCode::CharToAscii, true),
    op("chr", 1, OpCode::AsciiToChar, true),
    op("mblength", 1, OpCode::MbStringLength, true),
    op("mbord", 1, OpCode::MbCharToAscii, true),
    op("mbchr", 1, OpCode::MbAsciiToChar, true),
    op("substring", 3, OpCode::StringExtract, true),
    op("mbsubstring", 3, OpCode::MbStringExtract, true),
    op("targetPath", 1, OpCode::TargetPath, true),
    op("eval", 1, OpCode::GetVariable, true),
    // Dragging pops its operands target first
    Builtin {
        name: "startDrag",
        min_args: 1,
        max_args: 6,
        rule: Rule::Reversed(OpCode::StartDrag),
    },
    // Navigation and clips
    nav("getURL", 1, 3, Navigation::GetUrl),
    nav("loadMovie", 2, 3, Navigation::LoadMovie),
    nav("loadMovieNum", 2, 3, Navigation::LoadMovieNum),
    nav("unloadMovie", 1, 1, Navigation::UnloadMovie),
    nav("unloadMovieNum", 1, 1, Navigation::UnloadMovieNum),
    nav("loadVariables", 2, 3, Navigation::LoadVariables),
    nav("loadVariablesNum", 2, 3, Navigation::LoadVariablesNum),
    nav("fscommand", 1, 2, Navigation::FsCommand),
    nav("gotoAndPlay", 1, 1, Navigation::Goto { play: true }),
    nav("gotoAndStop", 1, 1, Navigation::Goto { play: false }),
    nav("setTarget", 1, 1, Navigation::SetTarget),
    nav("duplicateMovieClip", 3, 3, Navigation::DuplicateClip),
    nav("getProperty", 2, 2, Navigation::GetProperty),
    nav("setProperty", 3, 3, Navigation::SetProperty),
    // Global functions the player resolves by name
    by_name("isNaN", 1, 1),
    by_name("isFinite", 1, 1),
    by_name("parseInt", 1, 2),
    by_name("parseFloat", 1, 1),
    by_name("escape", 1, 1),
    by_name("unescape", 1, 1),
    by_name("getVersion", 0, 0),
    by_name("setInterval", 2, 16),
    by_name("clearInterval", 1, 1),
    by_name("updateAfterEvent", 0, 0),
];

static BUILTINS: LazyLock<FxHashMap<String, Builtin>> = LazyLock::new(|| {
    BUILTIN_LIST
        .iter()
        .map(|builtin| (builtin.name.to_ascii_lowercase(), *builtin))
        .collect()
});

/// Look up a built-in by name, ignoring case.
pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.get(name.to_ascii_lowercase().as_str())
}

/// Clip properties addressable by index through `GetProperty`/`SetProperty`.
const PROPERTY_LIST: &[(&str, i32)] = &[
    ("_x", 0),
    ("_y", 1),
    ("_xscale", 2),
    ("_yscale", 3),
    ("_currentframe", 4),
    ("_totalframes", 5),
    ("_alpha", 6),
    ("_visible", 7),
    ("_width", 8),
    ("_height", 9),
    ("_rotation", 10),
    ("_target", 11),
    ("_framesloaded", 12),
    ("_name", 13),
    ("_droptarget", 14),
    ("_url", 15),
    ("_highquality", 16),
    ("_focusrect", 17),
    ("_soundbuftime", 18),
    ("_quality", 19),
    ("_xmouse", 20),
    ("_ymouse", 21),
];

static PROPERTIES: LazyLock<FxHashMap<&'static str, i32>> =
    LazyLock::new(|| PROPERTY_LIST.iter().copied().collect());

/// Property index for a clip property name, ignoring case.
pub fn property_code(name: &str) -> Option<i32> {
    if !name.starts_with('_') {
        return None;
    }
    PROPERTIES.get(name.to_ascii_lowercase().as_str()).copied()
}

/// Value of a compile-time constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    /// Integer constant
    Int(i32),
    /// Double constant
    Double(f64),
    /// String constant
    Str(&'static str),
}

/// Constant bound to a bare identifier.
pub fn named_constant(name: &str) -> Option<Constant> {
    match name {
        "Infinity" => Some(Constant::Double(f64::INFINITY)),
        "NaN" => Some(Constant::Double(f64::NAN)),
        "newline" => Some(Constant::Str("\n")),
        _ => None,
    }
}

/// Constant member of a global object such as `Math.PI`.
pub fn member_constant(object: &str, member: &str) -> Option<Constant> {
    use std::f64::consts;

    let value = match (object, member) {
        ("Math", "PI") => Constant::Double(consts::PI),
        ("Math", "E") => Constant::Double(consts::E),
        ("Math", "LN2") => Constant::Double(consts::LN_2),
        ("Math", "LN10") => Constant::Double(consts::LN_10),
        ("Math", "LOG2E") => Constant::Double(consts::LOG2_E),
        ("Math", "LOG10E") => Constant::Double(consts::LOG10_E),
        ("Math", "SQRT1_2") => Constant::Double(consts::FRAC_1_SQRT_2),
        ("Math", "SQRT2") => Constant::Double(consts::SQRT_2),
        ("Number", "MAX_VALUE") => Constant::Double(f64::MAX),
        ("Number", "MIN_VALUE") => Constant::Double(5e-324),
        ("Number", "NaN") => Constant::Double(f64::NAN),
        ("Number", "POSITIVE_INFINITY") => Constant::Double(f64::INFINITY),
        ("Number", "NEGATIVE_INFINITY") => Constant::Double(f64::NEG_INFINITY),
        ("Key", "BACKSPACE") => Constant::Int(8),
        ("Key", "TAB") => Constant::Int(9),
        ("Key", "ENTER") => Constant::Int(13),
        ("Key", "SHIFT") => Constant::Int(16),
        ("Key", "CONTROL") => Constant::Int(17),
        ("Key", "CAPSLOCK") => Constant::Int(20),
        ("Key", "ESCAPE") => Constant::Int(27),
        ("Key", "SPACE") => Constant::Int(32),
        ("Key", "PGUP") => Constant::Int(33),
        ("Key", "PGDN") => Constant::Int(34),
        ("Key", "END") => Constant::Int(35),
        ("Key", "HOME") => Constant::Int(36),
        ("Key", "LEFT") => Constant::Int(37),
        ("Key", "UP") => Constant::Int(38),
        ("Key", "RIGHT") => Constant::Int(39),
        ("Key", "DOWN") => Constant::Int(40),
        ("Key", "INSERT") => Constant::Int(45),
        ("Key", "DELETEKEY") => Constant::Int(46),
        _ => return None,
    };
    Some(value)
}

// ============================================================================
// Argument shapes
// ============================================================================
//
// Collection and generation must agree on which calls take the static
// record forms, so both ask these helpers.

/// Text of a string literal node.
pub fn literal_str(tree: &Tree, id: NodeId) -> Option<&str> {
    match (tree.kind(id), tree.payload(id)) {
        (NodeKind::StringLiteral, Payload::Str(s)) => Some(s),
        _ => None,
    }
}

/// Value of an integer literal node.
pub fn literal_int(tree: &Tree, id: NodeId) -> Option<i32> {
    match (tree.kind(id), tree.payload(id)) {
        (NodeKind::IntegerLiteral, Payload::Int(n)) => Some(*n),
        _ => None,
    }
}

/// `GetUrl2` method bits for an optional `"GET"`/`"POST"` argument.
///
/// Anything else is ignored and yields 0.
pub fn method_flag(tree: &Tree, arg: Option<NodeId>) -> u8 {
    let Some(method) = arg.and_then(|arg| literal_str(tree, arg)) else {
        return 0;
    };
    if method.eq_ignore_ascii_case("get") {
        URL_METHOD_GET
    } else if method.eq_ignore_ascii_case("post") {
        URL_METHOD_POST
    } else {
        0
    }
}

/// URL and window of a `getURL` call that fits the static `GetUrl` record.
pub fn static_url(tree: &Tree, args: &[NodeId]) -> Option<(String, String)> {
    if method_flag(tree, args.get(2).copied()) != 0 {
        return None;
    }
    static_pair(tree, args)
}

/// Command and arguments of an `fscommand` call with literal operands.
pub fn static_fscommand(tree: &Tree, args: &[NodeId]) -> Option<(String, String)> {
    static_pair(tree, args)
}

fn static_pair(tree: &Tree, args: &[NodeId]) -> Option<(String, String)> {
    let first = literal_str(tree, *args.first()?)?;
    let second = match args.get(1) {
        Some(&arg) => literal_str(tree, arg)?,
        None => "",
    };
    Some((first.to_owned(), second.to_owned()))
}

/// Level target for a literal level number.
pub fn level_target(tree: &Tree, arg: NodeId) -> Option<String> {
    literal_int(tree, arg).map(|level| format!("{LEVEL_PREFIX}{level}"))
}

/// Zero-based frame of a literal `gotoAndPlay`/`gotoAndStop` argument.
pub fn literal_frame(tree: &Tree, arg: NodeId) -> Option<u16> {
    literal_int(tree, arg).and_then(|frame| u16::try_from(frame).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let builtin = lookup("GetUrl").unwrap();
        assert_eq!(builtin.name, "getURL");
        assert_eq!((builtin.min_args, builtin.max_args), (1, 3));
        assert!(lookup("gotoandplay").is_some());
        assert!(lookup("myFunction").is_none());
    }

    #[test]
    fn test_yields_value() {
        assert!(!lookup("trace").unwrap().yields_value());
        assert!(lookup("random").unwrap().yields_value());
        assert!(lookup("getProperty").unwrap().yields_value());
        assert!(!lookup("setProperty").unwrap().yields_value());
        assert!(lookup("parseInt").unwrap().yields_value());
    }

    #[test]
    fn test_accepts_range() {
        let start_drag = lookup("startDrag").unwrap();
        assert!(start_drag.accepts(1));
        assert!(start_drag.accepts(6));
        assert!(!start_drag.accepts(0));
        assert!(!start_drag.accepts(7));
    }

    #[test]
    fn test_property_codes() {
        assert_eq!(property_code("_x"), Some(0));
        assert_eq!(property_code("_ALPHA"), Some(6));
        assert_eq!(property_code("_ymouse"), Some(21));
        assert_eq!(property_code("x"), None);
        assert_eq!(property_code("_parent"), None);
    }

    #[test]
    fn test_argument_shapes() {
        let mut tree = Tree::script();
        let url = tree.string("http://example.com");
        let window = tree.string("_blank");
        let post = tree.string("POST");
        let dynamic = tree.ident("u");
        assert_eq!(
            static_url(&tree, &[url, window]),
            Some(("http://example.com".into(), "_blank".into()))
        );
        assert_eq!(static_url(&tree, &[url, window, post]), None);
        assert_eq!(static_url(&tree, &[dynamic]), None);
        assert_eq!(method_flag(&tree, Some(post)), URL_METHOD_POST);
        assert_eq!(method_flag(&tree, Some(window)), 0);

        let level = tree.int(2);
        assert_eq!(level_target(&tree, level).as_deref(), Some("_level2"));
        let negative = tree.int(-1);
        assert_eq!(literal_frame(&tree, negative), None);
        assert_eq!(literal_frame(&tree, level), Some(2));
    }

    #[test]
    fn test_constants() {
        assert_eq!(named_constant("newline"), Some(Constant::Str("\n")));
        assert!(matches!(named_constant("NaN"), Some(Constant::Double(d)) if d.is_nan()));
        assert_eq!(member_constant("Key", "LEFT"), Some(Constant::Int(37)));
        assert_eq!(
            member_constant("Math", "PI"),
            Some(Constant::Double(std::f64::consts::PI))
        );
        assert_eq!(member_constant("Math", "random"), None);
    }
}
