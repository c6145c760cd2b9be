use crate::foundation::ids::NodeId;
use std::collections::BTreeSet;
use std::fmt;

/// Matches every node name at any namespace depth, including the root namespace.
pub(crate) const ALL_NAMESPACES: &str = "::*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PatternError {
    pub(crate) offset: usize,
    pub(crate) message: String,
}

impl PatternError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pattern error at byte {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for PatternError {}

/// One element of a compiled term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Elem {
    Lit(String),
    /// `*`: any run of `[A-Za-z0-9_]`.
    Star,
    /// Leading `::`: zero or more `name:` namespace segments.
    AnyNamespaces,
    Colon,
    Pipe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Term {
    pub(crate) negate: bool,
    /// Term contains `|` and matches full paths.
    pub(crate) path: bool,
    /// Path term starting with `|`: anchored at the root.
    pub(crate) rooted: bool,
    pub(crate) elems: Vec<Elem>,
}

/// Node the pattern is evaluated against.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub(crate) id: NodeId,
    pub(crate) leaf: String,
    pub(crate) path: String,
}

/// Compiled selector pattern: whitespace-separated terms applied in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Pattern {
    pub(crate) terms: Vec<Term>,
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn compile_term(input: &str, base: usize) -> Result<Term, PatternError> {
    let bytes = input.as_bytes();
    let mut i = 0usize;
    let negate = bytes.first() == Some(&b'-');
    if negate {
        i += 1;
    }
    if i == bytes.len() {
        return Err(PatternError::new(base, "empty term"));
    }

    let rooted = bytes.get(i) == Some(&b'|');
    let mut elems = Vec::new();
    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if is_word(c) {
            while i < bytes.len() && is_word(bytes[i]) {
                i += 1;
            }
            elems.push(Elem::Lit(input[start..i].to_owned()));
            continue;
        }

        match c {
            b'*' => {
                // `**` is the same as `*`.
                if elems.last() != Some(&Elem::Star) {
                    elems.push(Elem::Star);
                }
                i += 1;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => {
                i += 2;
                let next = bytes.get(i).copied();
                if next.is_none() || next == Some(b'|') || next == Some(b':') {
                    return Err(PatternError::new(
                        base + start,
                        "'::' must be followed by a name",
                    ));
                }
                match elems.last() {
                    None | Some(Elem::Pipe) => elems.push(Elem::AnyNamespaces),
                    _ => {
                        elems.push(Elem::Colon);
                        elems.push(Elem::AnyNamespaces);
                    }
                }
            }
            b':' => {
                let prev_ok = matches!(elems.last(), Some(Elem::Lit(_) | Elem::Star));
                if !prev_ok || i + 1 == bytes.len() {
                    return Err(PatternError::new(
                        base + start,
                        "':' must separate a namespace from a name",
                    ));
                }
                elems.push(Elem::Colon);
                i += 1;
            }
            b'|' => {
                if elems.last() == Some(&Elem::Pipe) || i + 1 == bytes.len() {
                    return Err(PatternError::new(base + start, "empty path segment"));
                }
                elems.push(Elem::Pipe);
                i += 1;
            }
            _ => {
                let found = input[start..].chars().next().unwrap_or('?');
                return Err(PatternError::new(
                    base + start,
                    format!("unexpected character '{found}'"),
                ));
            }
        }
    }

    let path = elems.contains(&Elem::Pipe);
    if rooted {
        elems.remove(0);
    }
    Ok(Term {
        negate,
        path,
        rooted,
        elems,
    })
}

/// Match of `elems` against the whole of `s`.
fn match_elems(elems: &[Elem], s: &[u8]) -> bool {
    Matcher::new(elems, s).matches(0, 0)
}

/// Backtracking matcher memoized on (element index, byte offset), so adjacent `*` runs stay
/// polynomial in the name length.
struct Matcher<'a> {
    elems: &'a [Elem],
    s: &'a [u8],
    memo: Vec<Option<bool>>,
}

impl<'a> Matcher<'a> {
    fn new(elems: &'a [Elem], s: &'a [u8]) -> Self {
        Self {
            elems,
            s,
            memo: vec![None; (elems.len() + 1) * (s.len() + 1)],
        }
    }

    fn matches(&mut self, elem: usize, at: usize) -> bool {
        let slot = elem * (self.s.len() + 1) + at;
        if let Some(hit) = self.memo[slot] {
            return hit;
        }
        let out = self.step(elem, at);
        self.memo[slot] = Some(out);
        out
    }

    fn step(&mut self, elem: usize, at: usize) -> bool {
        let (elems, s) = (self.elems, self.s);
        let Some(first) = elems.get(elem) else {
            return at == s.len();
        };
        let rest = &s[at..];
        match first {
            Elem::Lit(lit) => {
                rest.starts_with(lit.as_bytes()) && self.matches(elem + 1, at + lit.len())
            }
            Elem::Colon => rest.first() == Some(&b':') && self.matches(elem + 1, at + 1),
            Elem::Pipe => rest.first() == Some(&b'|') && self.matches(elem + 1, at + 1),
            Elem::Star => {
                let run = rest.iter().take_while(|b| is_word(**b)).count();
                (0..=run).rev().any(|n| self.matches(elem + 1, at + n))
            }
            Elem::AnyNamespaces => {
                let mut pos = at;
                loop {
                    if self.matches(elem + 1, pos) {
                        return true;
                    }
                    let seg = s[pos..].iter().take_while(|b| is_word(**b)).count();
                    if seg == 0 || s.get(pos + seg) != Some(&b':') {
                        return false;
                    }
                    pos += seg + 1;
                }
            }
        }
    }
}

impl Term {
    pub(crate) fn matches(&self, leaf: &str, path: &str) -> bool {
        if !self.path {
            return match_elems(&self.elems, leaf.as_bytes());
        }
        let Some(rest) = path.strip_prefix('|') else {
            return false;
        };
        if self.rooted {
            return match_elems(&self.elems, rest.as_bytes());
        }
        // Unrooted path terms match any suffix that starts at a segment boundary.
        let bytes = rest.as_bytes();
        if match_elems(&self.elems, bytes) {
            return true;
        }
        bytes
            .iter()
            .enumerate()
            .filter(|(_, b)| **b == b'|')
            .any(|(i, _)| match_elems(&self.elems, &bytes[i + 1..]))
    }
}

impl Pattern {
    pub(crate) fn parse(input: &str) -> Result<Self, PatternError> {
        let mut terms = Vec::new();
        let bytes = input.as_bytes();
        let mut i = 0usize;
        while i < bytes.len() {
            if bytes[i].is_ascii_whitespace() {
                i += 1;
                continue;
            }
            let start = i;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            terms.push(compile_term(&input[start..i], start)?);
        }
        Ok(Self { terms })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Accumulate matches term by term: positive terms add from `candidates`, negated terms
    /// remove from what has been accumulated so far.
    pub(crate) fn select(&self, candidates: &[Candidate]) -> BTreeSet<NodeId> {
        let mut out = BTreeSet::new();
        for term in &self.terms {
            for c in candidates {
                if term.matches(&c.leaf, &c.path) {
                    if term.negate {
                        out.remove(&c.id);
                    } else {
                        out.insert(c.id);
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/selector/pattern.rs"]
mod tests;
