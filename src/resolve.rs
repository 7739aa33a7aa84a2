//! Scope resolution: gives every variable reference a storage slot and every
//! block its `local_slots` count.
//!
//! Frames live in an arena indexed by [`FrameId`], one frame per block, in
//! the order blocks are entered. Resolution is two walks over the same
//! traversal order:
//!
//! 1. **bind** looks each name up through the parent chain and, on a miss,
//!    declares it in the innermost frame. Each reference is recorded as a
//!    `(frame, index)` pair.
//! 2. **layout** turns pairs into slots. A frame's base is its parent's base
//!    plus the parent's *final* local count, so a nested block always sits
//!    above every slot its ancestors grow on entry.
//!
//! Sibling blocks share a base and therefore reuse slot numbers; their
//! storage never coexists at run time.

use crate::ast::*;

pub type FrameId = usize;

#[derive(Debug, Clone)]
struct Frame {
    parent: Option<FrameId>,
    names: Vec<String>,
    base: Slot,
}

/// Every scope frame of a resolved program.
#[derive(Debug, Clone, Default)]
pub struct ScopeArena {
    frames: Vec<Frame>,
}

impl ScopeArena {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Names declared directly in `frame`, in slot order.
    pub fn names(&self, frame: FrameId) -> &[String] {
        self.frames.get(frame).map(|f| f.names.as_slice()).unwrap_or(&[])
    }

    /// Highest slot id any root-to-leaf scope path reaches.
    pub fn peak_slot(&self) -> Slot {
        self.frames
            .iter()
            .map(|f| f.base + f.names.len() as Slot)
            .max()
            .unwrap_or(0)
    }

    fn lookup(&self, from: FrameId, name: &str) -> Option<(FrameId, usize)> {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let frame = &self.frames[id];
            if let Some(index) = frame.names.iter().position(|n| n == name) {
                return Some((id, index));
            }
            cursor = frame.parent;
        }
        None
    }

    fn slot_of(&self, frame: FrameId, index: usize) -> Slot {
        self.frames[frame].base + index as Slot + 1
    }

    /// Bases depend on final parent sizes, so this runs after binding.
    /// Parents always precede their children in the arena.
    fn layout(&mut self) {
        for id in 0..self.frames.len() {
            let base = match self.frames[id].parent {
                Some(p) => self.frames[p].base + self.frames[p].names.len() as Slot,
                None => 0,
            };
            self.frames[id].base = base;
        }
    }
}

/// Resolve `root` in place and return the frame arena.
pub fn resolve(root: &mut Block) -> ScopeArena {
    let mut binder = Binder { arena: ScopeArena::default(), stack: Vec::new(), bindings: Vec::new() };
    walk_block(&mut binder, root);

    let Binder { mut arena, bindings, .. } = binder;
    arena.layout();

    let mut assigner = Assigner { arena: &arena, bindings: bindings.into_iter() };
    walk_block(&mut assigner, root);

    tracing::debug!(
        frames = arena.frame_count(),
        peak_slot = arena.peak_slot(),
        "resolved scopes"
    );
    arena
}

// ---- Traversal ----

/// Callbacks for the shared traversal. Both passes must see variables in
/// exactly the same order.
trait ScopeVisitor {
    fn enter_block(&mut self);
    fn leave_block(&mut self, block: &mut Block);
    fn var(&mut self, var: &mut Var);
}

fn walk_block<V: ScopeVisitor>(v: &mut V, block: &mut Block) {
    v.enter_block();
    for stmt in &mut block.stmts {
        walk_stmt(v, stmt);
    }
    v.leave_block(block);
}

fn walk_stmt<V: ScopeVisitor>(v: &mut V, stmt: &mut Stmt) {
    match stmt {
        Stmt::Cond(cond) => {
            walk_expr(v, &mut cond.condition);
            walk_block(v, &mut cond.then_block);
            if let Some(else_block) = &mut cond.else_block {
                walk_block(v, else_block);
            }
        }
        Stmt::Loop(lp) => walk_block(v, &mut lp.body),
        Stmt::Break(_) => {}
        Stmt::Call(call) => {
            // Result before arguments: `$x = f $x;` declares $x.
            if let Some(result) = &mut call.result {
                v.var(result);
            }
            walk_call(v, &mut call.call);
        }
        Stmt::Block(block) => walk_block(v, block),
    }
}

fn walk_call<V: ScopeVisitor>(v: &mut V, call: &mut CallExpr) {
    for arg in &mut call.args {
        walk_expr(v, arg);
    }
}

fn walk_expr<V: ScopeVisitor>(v: &mut V, expr: &mut Expr) {
    match expr {
        Expr::Var(var) => v.var(var),
        Expr::Paren(inner) => walk_expr(v, inner),
        Expr::Call(call) => walk_call(v, call),
    }
}

// ---- Pass 1: bind ----

struct Binder {
    arena: ScopeArena,
    stack: Vec<FrameId>,
    bindings: Vec<(FrameId, usize)>,
}

impl ScopeVisitor for Binder {
    fn enter_block(&mut self) {
        let id = self.arena.frames.len();
        self.arena.frames.push(Frame {
            parent: self.stack.last().copied(),
            names: Vec::new(),
            base: 0,
        });
        self.stack.push(id);
    }

    fn leave_block(&mut self, block: &mut Block) {
        if let Some(id) = self.stack.pop() {
            block.local_slots = self.arena.frames[id].names.len() as u32;
        }
    }

    fn var(&mut self, var: &mut Var) {
        let Some(&current) = self.stack.last() else { return };
        let binding = match self.arena.lookup(current, &var.name) {
            Some(found) => found,
            None => {
                let names = &mut self.arena.frames[current].names;
                names.push(var.name.clone());
                (current, names.len() - 1)
            }
        };
        self.bindings.push(binding);
    }
}

// ---- Pass 2: assign ----

struct Assigner<'a> {
    arena: &'a ScopeArena,
    bindings: std::vec::IntoIter<(FrameId, usize)>,
}

impl ScopeVisitor for Assigner<'_> {
    fn enter_block(&mut self) {}

    fn leave_block(&mut self, _block: &mut Block) {}

    fn var(&mut self, var: &mut Var) {
        if let Some((frame, index)) = self.bindings.next() {
            var.slot = Some(self.arena.slot_of(frame, index));
        }
    }
}
