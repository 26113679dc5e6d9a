//! Query streams and a timed runner for comparing the lookup structures.
//!
//! A query file starts with the number of records, followed by one record per
//! line:
//!
//! ```text
//! 5
//! 0 17        insert 17
//! 1 17        delete 17
//! 2 4         contains 4
//! 3 4 9       modify 4 into 9
//! 4           traverse in order
//! ```

use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

use clap::ValueEnum;
use log::{debug, info};
use rand::Rng;
use thiserror::Error;

use crate::bst::{Balancer, Tree};
use crate::config::HashTableConfig;
use crate::hash_table::{identity_hash, multiplicative_hash, BucketHashTable, HashFn};
use crate::{AvlTree, RbTree};

/// Keys produced by the random generator lie in `0..KEY_LIMIT`.
pub const KEY_LIMIT: i32 = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Insert(i32),
    Delete(i32),
    Contains(i32),
    Modify(i32, i32),
    Traverse,
}

impl Query {
    pub fn opcode(&self) -> u8 {
        match self {
            Query::Insert(_) => 0,
            Query::Delete(_) => 1,
            Query::Contains(_) => 2,
            Query::Modify(..) => 3,
            Query::Traverse => 4,
        }
    }
}

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("query file is empty")]
    Empty,

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("header announces {expected} queries but the file has {found}")]
    CountMismatch { expected: usize, found: usize },

    #[error(transparent)]
    Structure(#[from] crate::Error),
}

fn parse_error(line: usize, reason: impl Into<String>) -> HarnessError {
    HarnessError::Parse {
        line,
        reason: reason.into(),
    }
}

fn parse_key(line: usize, token: Option<&str>) -> Result<i32, HarnessError> {
    let token = token.ok_or_else(|| parse_error(line, "missing operand"))?;
    token
        .parse()
        .map_err(|e| parse_error(line, format!("bad key {token:?}: {e}")))
}

fn parse_record(line: usize, text: &str) -> Result<Query, HarnessError> {
    let mut tokens = text.split_whitespace();
    let query = match tokens.next() {
        Some("0") => Query::Insert(parse_key(line, tokens.next())?),
        Some("1") => Query::Delete(parse_key(line, tokens.next())?),
        Some("2") => Query::Contains(parse_key(line, tokens.next())?),
        Some("3") => {
            let old = parse_key(line, tokens.next())?;
            Query::Modify(old, parse_key(line, tokens.next())?)
        }
        Some("4") => Query::Traverse,
        Some(other) => return Err(parse_error(line, format!("unknown opcode {other:?}"))),
        None => return Err(parse_error(line, "empty record")),
    };

    if let Some(extra) = tokens.next() {
        return Err(parse_error(line, format!("unexpected operand {extra:?}")));
    }
    Ok(query)
}

/// Parse a whole query stream. Blank lines are ignored.
pub fn parse_queries<R: BufRead>(reader: R) -> Result<Vec<Query>, HarnessError> {
    let mut expected = None;
    let mut queries = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let (number, text) = (i + 1, line?);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        match expected {
            None => {
                let count: usize = text
                    .parse()
                    .map_err(|e| parse_error(number, format!("bad query count {text:?}: {e}")))?;
                queries.reserve(count.min(1 << 20));
                expected = Some(count);
            }
            Some(_) => queries.push(parse_record(number, text)?),
        }
    }

    let expected = expected.ok_or(HarnessError::Empty)?;
    if queries.len() != expected {
        return Err(HarnessError::CountMismatch {
            expected,
            found: queries.len(),
        });
    }
    Ok(queries)
}

pub fn write_queries<W: Write>(mut out: W, queries: &[Query]) -> io::Result<()> {
    writeln!(out, "{}", queries.len())?;
    for query in queries {
        match *query {
            Query::Insert(k) | Query::Delete(k) | Query::Contains(k) => {
                writeln!(out, "{} {k}", query.opcode())?
            }
            Query::Modify(old, new) => writeln!(out, "3 {old} {new}")?,
            Query::Traverse => writeln!(out, "4")?,
        }
    }
    out.flush()
}

/// Shape of a generated query stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Pattern {
    /// `n` random inserts followed by `n` random mixed operations.
    Mixed,
    /// `n` ascending inserts followed by `n` ascending lookups.
    Ascending,
}

pub fn generate<R: Rng + ?Sized>(pattern: Pattern, rng: &mut R, n: usize) -> Vec<Query> {
    match pattern {
        Pattern::Mixed => generate_mixed(rng, n),
        Pattern::Ascending => generate_ascending(n),
    }
}

/// `n` random inserts, then `n` operations drawn uniformly from insert,
/// delete, contains and modify, with a traversal every `2n / 7` queries.
///
/// Deletes and modifies target keys that are still present, and one lookup in
/// five on average asks for an arbitrary key.
pub fn generate_mixed<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<Query> {
    let mut queries = Vec::with_capacity(2 * n);
    let mut live: Vec<i32> = (0..n).map(|_| rng.gen_range(0..KEY_LIMIT)).collect();
    queries.extend(live.iter().map(|&k| Query::Insert(k)));

    let traverse_every = 2 * n / 7;
    let mut position = 2 * n;

    for _ in 0..n {
        position += 1;
        if traverse_every != 0 && position % traverse_every == 0 {
            queries.push(Query::Traverse);
            continue;
        }

        let opcode = if live.is_empty() { 0 } else { rng.gen_range(0..4) };
        let query = match opcode {
            0 => {
                let key = rng.gen_range(0..KEY_LIMIT);
                live.push(key);
                Query::Insert(key)
            }
            1 => {
                let idx = rng.gen_range(0..live.len());
                Query::Delete(live.swap_remove(idx))
            }
            2 => {
                let key = live[rng.gen_range(0..live.len())];
                if key % 5 == 3 {
                    Query::Contains(rng.gen_range(0..KEY_LIMIT))
                } else {
                    Query::Contains(key)
                }
            }
            _ => {
                let idx = rng.gen_range(0..live.len());
                let old = live.swap_remove(idx);
                let new = rng.gen_range(0..KEY_LIMIT);
                live.push(new);
                Query::Modify(old, new)
            }
        };
        queries.push(query);
    }

    queries
}

/// Sorted input, the worst case for an unbalanced tree.
pub fn generate_ascending(n: usize) -> Vec<Query> {
    let n = n.min(KEY_LIMIT as usize) as i32;
    (0..n)
        .map(Query::Insert)
        .chain((0..n).map(Query::Contains))
        .collect()
}

/// The operations the runner needs from a structure.
pub trait Lookup {
    fn insert(&mut self, key: i32) -> crate::Result<()>;
    fn delete(&mut self, key: i32) -> crate::Result<()>;
    fn modify(&mut self, old: i32, new: i32) -> crate::Result<()>;
    fn contains(&self, key: i32) -> bool;
    fn len(&self) -> usize;
    fn traverse_inorder(&self, f: &mut dyn FnMut(i32, u32));

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<B: Balancer> Lookup for Tree<B> {
    fn insert(&mut self, key: i32) -> crate::Result<()> {
        Tree::insert(self, key)
    }

    fn delete(&mut self, key: i32) -> crate::Result<()> {
        Tree::delete(self, key)
    }

    fn modify(&mut self, old: i32, new: i32) -> crate::Result<()> {
        Tree::modify(self, old, new)
    }

    fn contains(&self, key: i32) -> bool {
        Tree::contains(self, key)
    }

    fn len(&self) -> usize {
        Tree::len(self)
    }

    fn traverse_inorder(&self, f: &mut dyn FnMut(i32, u32)) {
        Tree::traverse_inorder(self, f)
    }
}

impl<H: Fn(i32) -> usize> Lookup for BucketHashTable<H> {
    fn insert(&mut self, key: i32) -> crate::Result<()> {
        BucketHashTable::insert(self, key)
    }

    fn delete(&mut self, key: i32) -> crate::Result<()> {
        BucketHashTable::delete(self, key)
    }

    fn modify(&mut self, old: i32, new: i32) -> crate::Result<()> {
        BucketHashTable::modify(self, old, new)
    }

    fn contains(&self, key: i32) -> bool {
        BucketHashTable::contains(self, key)
    }

    fn len(&self) -> usize {
        BucketHashTable::len(self)
    }

    fn traverse_inorder(&self, f: &mut dyn FnMut(i32, u32)) {
        BucketHashTable::traverse_inorder(self, f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Structure {
    Avl,
    Rb,
    Hash,
}

impl Structure {
    pub fn name(&self) -> &'static str {
        match self {
            Structure::Avl => "AVL",
            Structure::Rb => "RedBlack",
            Structure::Hash => "HashTable",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum HashKind {
    Identity,
    Multiplicative,
}

impl HashKind {
    pub fn function(self) -> HashFn {
        match self {
            HashKind::Identity => identity_hash,
            HashKind::Multiplicative => multiplicative_hash,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub structure: &'static str,
    pub queries: usize,
    /// Queries that returned an error, such as deleting an absent key.
    pub errors: usize,
    /// Lookups that found their key.
    pub hits: usize,
    pub final_len: usize,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn queries_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.queries as f64 / secs
        } else {
            0.0
        }
    }
}

fn dump_traversal<L: Lookup + ?Sized>(lookup: &L, out: &mut dyn Write) -> io::Result<()> {
    if lookup.is_empty() {
        return writeln!(out, "(Null)");
    }
    let mut result = Ok(());
    lookup.traverse_inorder(&mut |key, _| {
        if result.is_ok() {
            result = write!(out, "{key} ");
        }
    });
    result?;
    writeln!(out)
}

/// Replay `queries` against `lookup`, timing the whole replay.
///
/// Failing queries are counted in the report rather than aborting the run.
/// Traversals are written to `dump` when one is given.
pub fn run_queries<L: Lookup + ?Sized>(
    name: &'static str,
    lookup: &mut L,
    queries: &[Query],
    mut dump: Option<&mut dyn Write>,
) -> io::Result<RunReport> {
    let mut errors = 0;
    let mut hits = 0;
    let start = Instant::now();

    for query in queries {
        let result = match *query {
            Query::Insert(k) => lookup.insert(k),
            Query::Delete(k) => lookup.delete(k),
            Query::Modify(old, new) => lookup.modify(old, new),
            Query::Contains(k) => {
                if lookup.contains(k) {
                    hits += 1;
                }
                Ok(())
            }
            Query::Traverse => {
                if let Some(out) = dump.as_deref_mut() {
                    dump_traversal(lookup, out)?;
                }
                Ok(())
            }
        };

        if let Err(e) = result {
            debug!("{name}: {query:?} failed: {e}");
            errors += 1;
        }
    }

    let report = RunReport {
        structure: name,
        queries: queries.len(),
        errors,
        hits,
        final_len: lookup.len(),
        elapsed: start.elapsed(),
    };
    info!(
        "{name}: {} queries in {:.2?} ({} errors)",
        report.queries, report.elapsed, report.errors
    );
    Ok(report)
}

/// Build a fresh instance of `structure` and replay `queries` on it.
pub fn run_structure(
    structure: Structure,
    hash: HashKind,
    config: &HashTableConfig,
    queries: &[Query],
    dump: Option<&mut dyn Write>,
) -> Result<RunReport, HarnessError> {
    let name = structure.name();
    let report = match structure {
        Structure::Avl => run_queries(name, &mut AvlTree::new(), queries, dump)?,
        Structure::Rb => run_queries(name, &mut RbTree::new(), queries, dump)?,
        Structure::Hash => {
            let mut table = BucketHashTable::with_config(config.clone(), hash.function())?;
            run_queries(name, &mut table, queries, dump)?
        }
    };
    Ok(report)
}
