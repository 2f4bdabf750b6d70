//! Multi-terminal binary decision diagrams.
//!
//! Nodes live in a fixed-capacity arena and are made canonical through a
//! concurrent unique table. Every operation runs inside a [`Ctx`], which holds
//! a shared guard on the arena: the collector needs the exclusive guard, so
//! an open context pins every node it can see. Handles that must outlive a
//! context are pinned with a [`Root`].

mod cache;
mod leaf;
mod ops;
mod relation;
mod set;
mod walk;

pub use cache::*;
pub use leaf::*;
pub use ops::*;
pub use set::*;

use crate::error::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

pub type Var = u32;

/// Variable reported for terminals; larger than every real variable.
pub const NO_VAR: Var = Var::MAX;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Dd(u32);

impl Dd {
  /// Boolean false, also the undefined value of numeric functions.
  pub const FALSE: Dd = Dd(0);
  pub const TRUE: Dd = Dd(1);

  pub fn is_false(self) -> bool {
    self == Dd::FALSE
  }

  pub fn is_true(self) -> bool {
    self == Dd::TRUE
  }

  pub fn raw(self) -> u64 {
    self.0 as u64
  }

  fn index(self) -> usize {
    self.0 as usize
  }
}

enum Node<L> {
  Terminal,
  Inner { var: Var, low: Dd, high: Dd },
  Leaf(Box<L>),
}

#[derive(PartialEq, Eq, Hash)]
enum Key<L> {
  Inner(Var, Dd, Dd),
  Leaf(L),
}

struct Arena<L> {
  slots: Box<[OnceLock<Node<L>>]>,
  fresh: AtomicUsize,
  free: Vec<u32>,
  reused: AtomicUsize,
}

#[derive(Default)]
struct RootSet(Mutex<HashMap<Dd, usize>>);

impl RootSet {
  fn pin(&self, dd: Dd) {
    *self.0.lock().entry(dd).or_insert(0) += 1;
  }

  fn unpin(&self, dd: Dd) {
    let mut roots = self.0.lock();
    if let Some(count) = roots.get_mut(&dd) {
      *count -= 1;
      if *count == 0 {
        roots.remove(&dd);
      }
    }
  }
}

/// A diagram pinned against garbage collection until dropped.
pub struct Root {
  dd: Dd,
  roots: Arc<RootSet>,
}

impl Root {
  pub fn get(&self) -> Dd {
    self.dd
  }
}

impl Clone for Root {
  fn clone(&self) -> Self {
    self.roots.pin(self.dd);
    Root { dd: self.dd, roots: self.roots.clone() }
  }
}

impl Drop for Root {
  fn drop(&mut self) {
    self.roots.unpin(self.dd);
  }
}

impl std::fmt::Debug for Root {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Root({})", self.dd.0)
  }
}

pub struct Manager<L: Leaf> {
  arena: RwLock<Arena<L>>,
  unique: DashMap<Key<L>, Dd>,
  cache: OpCache,
  roots: Arc<RootSet>,
  capacity: usize,
  live: AtomicUsize,
  exhausted: AtomicBool,
  wanted: AtomicBool,
  tags: AtomicU64,
}

impl<L: Leaf> Manager<L> {
  pub fn new(capacity_log2: u32) -> Self {
    let capacity = 1_usize << capacity_log2.clamp(4, 31);
    let slots = (0..capacity).map(|_| OnceLock::new()).collect::<Box<[_]>>();
    for slot in &slots[..2] {
      let _ = slot.set(Node::Terminal);
    }
    Manager {
      arena: RwLock::new(Arena { slots, fresh: AtomicUsize::new(2), free: Vec::new(), reused: AtomicUsize::new(0) }),
      unique: DashMap::new(),
      cache: OpCache::new(capacity),
      roots: Arc::new(RootSet::default()),
      capacity,
      live: AtomicUsize::new(2),
      exhausted: AtomicBool::new(false),
      wanted: AtomicBool::new(false),
      tags: AtomicU64::new(1),
    }
  }

  /// Opens an operation context. Collection is impossible while it lives.
  pub fn ctx(&self) -> Ctx<'_, L> {
    Ctx { manager: self, arena: self.arena.read_recursive() }
  }

  pub fn protect(&self, dd: Dd) -> Root {
    self.roots.pin(dd);
    Root { dd, roots: self.roots.clone() }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn live(&self) -> usize {
    self.live.load(Ordering::Relaxed)
  }

  /// A number never handed out before by this manager, used to keep memo
  /// entries of unrelated computations apart.
  pub fn fresh_tag(&self) -> u64 {
    self.tags.fetch_add(1, Ordering::Relaxed)
  }

  /// Runs `op` in a context of its own and pins what it returns. If the node
  /// table fills up on the way, the collector runs and `op` starts over once;
  /// either way the collector gets its chance before this returns.
  ///
  /// Everything `op` reads must be pinned by the caller, and no other context
  /// may be open on this thread.
  pub fn steps(&self, op: impl Fn(&Ctx<'_, L>) -> Result<Vec<Dd>>) -> Result<Vec<Root>> {
    let attempt = || -> Result<Vec<Root>> {
      let ctx = self.ctx();
      let roots = op(&ctx)?.into_iter().map(|dd| ctx.protect(dd)).collect();
      Ok(roots)
    };
    let roots = match attempt() {
      Err(Error::NodeTableFull { .. }) if self.collect() => {
        debug!("Node table full, retrying after collection with {} of {} nodes live.", self.live(), self.capacity);
        attempt()?
      }
      result => result?,
    };
    self.collect_if_wanted();
    Ok(roots)
  }

  pub fn step(&self, op: impl Fn(&Ctx<'_, L>) -> Result<Dd>) -> Result<Root> {
    let mut roots = self.steps(|ctx| Ok(vec![op(ctx)?]))?;
    match roots.pop() {
      Some(root) => Ok(root),
      None => Err(Error::Invariant("step produced no diagram".into())),
    }
  }

  pub fn collect_if_wanted(&self) -> bool {
    self.wanted.load(Ordering::Relaxed) && self.collect()
  }

  /// Reclaims every node not reachable from a [`Root`].
  ///
  /// Returns false without collecting when a context is still open.
  pub fn collect(&self) -> bool {
    let Some(mut guard) = self.arena.try_write() else {
      return false;
    };
    let arena = &mut *guard;
    let limit = arena.fresh.load(Ordering::Relaxed).min(self.capacity);
    let mut marked = vec![false; limit];
    marked[0] = true;
    marked[1] = true;
    let mut stack = self.roots.0.lock().keys().copied().collect::<Vec<_>>();
    while let Some(dd) = stack.pop() {
      if marked[dd.index()] {
        continue;
      }
      marked[dd.index()] = true;
      if let Some(Node::Inner { low, high, .. }) = arena.slots[dd.index()].get() {
        stack.push(*low);
        stack.push(*high);
      }
    }
    let mut free = Vec::new();
    for (index, slot) in arena.slots[..limit].iter_mut().enumerate().skip(2) {
      if !marked[index] {
        slot.take();
        free.push(index as u32);
      }
    }
    self.unique.retain(|_, dd| marked[dd.index()]);
    self.cache.clear();
    let live = limit - free.len();
    arena.free = free;
    arena.reused.store(0, Ordering::Relaxed);
    arena.fresh.store(limit, Ordering::Relaxed);
    self.live.store(live, Ordering::Relaxed);
    self.exhausted.store(false, Ordering::Relaxed);
    self.wanted.store(false, Ordering::Relaxed);
    debug!("garbage collection: {} of {} nodes live", live, self.capacity);
    true
  }
}

/// Shared view of a [`Manager`] for the duration of one operation.
pub struct Ctx<'m, L: Leaf> {
  manager: &'m Manager<L>,
  arena: RwLockReadGuard<'m, Arena<L>>,
}

impl<'m, L: Leaf> Ctx<'m, L> {
  pub fn manager(&self) -> &'m Manager<L> {
    self.manager
  }

  fn node(&self, dd: Dd) -> &Node<L> {
    match self.arena.slots[dd.index()].get() {
      Some(node) => node,
      None => unreachable!("dangling diagram handle {:?}", dd),
    }
  }

  pub fn var(&self, dd: Dd) -> Var {
    match self.node(dd) {
      Node::Inner { var, .. } => *var,
      _ => NO_VAR,
    }
  }

  pub fn low(&self, dd: Dd) -> Dd {
    match self.node(dd) {
      Node::Inner { low, .. } => *low,
      _ => dd,
    }
  }

  pub fn high(&self, dd: Dd) -> Dd {
    match self.node(dd) {
      Node::Inner { high, .. } => *high,
      _ => dd,
    }
  }

  pub fn is_leaf(&self, dd: Dd) -> bool {
    !matches!(self.node(dd), Node::Inner { .. })
  }

  /// Numeric value of a leaf; `None` for inner nodes and the boolean terminals.
  pub fn value(&self, dd: Dd) -> Option<&L> {
    match self.node(dd) {
      Node::Leaf(value) => Some(value),
      _ => None,
    }
  }

  /// Low and high cofactor of `dd` with respect to `var`.
  pub fn cofactors(&self, dd: Dd, var: Var) -> (Dd, Dd) {
    match self.node(dd) {
      Node::Inner { var: v, low, high } if *v == var => (*low, *high),
      _ => (dd, dd),
    }
  }

  pub fn makenode(&self, var: Var, low: Dd, high: Dd) -> Result<Dd> {
    if low == high {
      return Ok(low);
    }
    debug_assert!(var < self.var(low) && var < self.var(high));
    self.intern(Key::Inner(var, low, high), || Node::Inner { var, low, high })
  }

  pub fn leaf(&self, value: L) -> Result<Dd> {
    let key = Key::Leaf(value.clone());
    self.intern(key, move || Node::Leaf(Box::new(value)))
  }

  fn intern(&self, key: Key<L>, node: impl FnOnce() -> Node<L>) -> Result<Dd> {
    if let Some(dd) = self.manager.unique.get(&key) {
      return Ok(*dd);
    }
    match self.manager.unique.entry(key) {
      Entry::Occupied(entry) => Ok(*entry.get()),
      Entry::Vacant(entry) => {
        let dd = self.alloc(node())?;
        entry.insert(dd);
        Ok(dd)
      }
    }
  }

  fn alloc(&self, node: Node<L>) -> Result<Dd> {
    let arena = &*self.arena;
    let reused = arena.reused.fetch_add(1, Ordering::Relaxed);
    let index = match arena.free.get(reused) {
      Some(&index) => index as usize,
      None => {
        let index = arena.fresh.fetch_add(1, Ordering::Relaxed);
        if index >= self.manager.capacity {
          self.manager.exhausted.store(true, Ordering::Relaxed);
          return Err(Error::NodeTableFull { capacity: self.manager.capacity });
        }
        index
      }
    };
    if arena.slots[index].set(node).is_err() {
      unreachable!("node slot {} allocated twice", index);
    }
    let live = self.manager.live.fetch_add(1, Ordering::Relaxed) + 1;
    if live > self.manager.capacity / 4 * 3 {
      self.manager.wanted.store(true, Ordering::Relaxed);
    }
    Ok(Dd(index as u32))
  }

  /// Checked at the entry of every recursive operator; once any worker ran
  /// out of nodes, every other worker unwinds too.
  pub fn safepoint(&self) -> Result<()> {
    if self.manager.exhausted.load(Ordering::Relaxed) {
      return Err(Error::NodeTableFull { capacity: self.manager.capacity });
    }
    Ok(())
  }

  /// Runs both closures, possibly in parallel, and joins their results.
  pub fn fork<A: Send, B: Send>(
    &self,
    a: impl FnOnce() -> Result<A> + Send,
    b: impl FnOnce() -> Result<B> + Send,
  ) -> Result<(A, B)> {
    let (a, b) = rayon::join(a, b);
    Ok((a?, b?))
  }

  pub fn protect(&self, dd: Dd) -> Root {
    self.manager.protect(dd)
  }

  pub fn cached(&self, op: Opcode, a: Dd, b: Dd, c: Dd, tag: u64) -> Option<Dd> {
    self.manager.cache.get(op, a, b, c, tag)
  }

  pub fn remember(&self, op: Opcode, a: Dd, b: Dd, c: Dd, tag: u64, result: Dd) -> Dd {
    self.manager.cache.put(op, a, b, c, tag, result);
    result
  }
}
