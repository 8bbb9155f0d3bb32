//! Lazily built, memoized executables per computation definition.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;

use sc_compiler::{CompileError, Computation, EagerExecutable, Executable, StagedCompiler};
use tracing::debug;

/// The three ways a computation can be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
    Eager,
    CompiledWithBackend,
    CompiledWithoutBackend,
}

impl VariantKind {
    pub fn compiled(use_backend: bool) -> Self {
        if use_backend {
            VariantKind::CompiledWithBackend
        } else {
            VariantKind::CompiledWithoutBackend
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VariantKind::Eager => "eager",
            VariantKind::CompiledWithBackend => "compiled-with-backend",
            VariantKind::CompiledWithoutBackend => "compiled-without-backend",
        };
        f.write_str(s)
    }
}

/// Built variants of one definition. Each slot is written at most once.
#[derive(Default)]
pub struct VariantSet {
    pub eager: Option<Rc<dyn Executable>>,
    pub compiled_with_backend: Option<Rc<dyn Executable>>,
    pub compiled_without_backend: Option<Rc<dyn Executable>>,
}

impl VariantSet {
    fn slot(&mut self, kind: VariantKind) -> &mut Option<Rc<dyn Executable>> {
        match kind {
            VariantKind::Eager => &mut self.eager,
            VariantKind::CompiledWithBackend => &mut self.compiled_with_backend,
            VariantKind::CompiledWithoutBackend => &mut self.compiled_without_backend,
        }
    }
}

struct Entry {
    // Holding the definition keeps its address from being reused by another
    // allocation while the entry exists.
    _definition: Rc<dyn Computation>,
    variants: VariantSet,
}

/// Per-definition variant memo, keyed by the identity of the `Rc`.
///
/// Two structurally equal definitions in different allocations never share
/// an entry. Failed builds are not cached.
pub struct VariantCache {
    compiler: StagedCompiler,
    entries: RefCell<HashMap<usize, Entry>>,
    builds: Cell<usize>,
}

fn key(definition: &Rc<dyn Computation>) -> usize {
    Rc::as_ptr(definition).cast::<()>() as usize
}

impl VariantCache {
    pub fn new(compiler: StagedCompiler) -> Self {
        VariantCache {
            compiler,
            entries: RefCell::new(HashMap::new()),
            builds: Cell::new(0),
        }
    }

    pub fn compiler(&self) -> &StagedCompiler {
        &self.compiler
    }

    /// Number of variants built so far.
    pub fn builds(&self) -> usize {
        self.builds.get()
    }

    /// Number of definitions with an entry.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn get_eager(&self, definition: &Rc<dyn Computation>) -> Rc<dyn Executable> {
        let build = || {
            let exe: Rc<dyn Executable> = Rc::new(EagerExecutable::new(Rc::clone(definition)));
            Ok::<_, Infallible>(exe)
        };
        match self.get_or_build(definition, VariantKind::Eager, build) {
            Ok(exe) => exe,
            Err(never) => match never {},
        }
    }

    pub fn get_compiled(
        &self,
        definition: &Rc<dyn Computation>,
        use_backend: bool,
    ) -> Result<Rc<dyn Executable>, CompileError> {
        self.get_or_build(definition, VariantKind::compiled(use_backend), || {
            let exe = self.compiler.compile(definition.as_ref(), use_backend)?;
            Ok(Rc::new(exe) as Rc<dyn Executable>)
        })
    }

    pub fn get(
        &self,
        definition: &Rc<dyn Computation>,
        kind: VariantKind,
    ) -> Result<Rc<dyn Executable>, CompileError> {
        match kind {
            VariantKind::Eager => Ok(self.get_eager(definition)),
            VariantKind::CompiledWithBackend => self.get_compiled(definition, true),
            VariantKind::CompiledWithoutBackend => self.get_compiled(definition, false),
        }
    }

    fn get_or_build<E>(
        &self,
        definition: &Rc<dyn Computation>,
        kind: VariantKind,
        build: impl FnOnce() -> Result<Rc<dyn Executable>, E>,
    ) -> Result<Rc<dyn Executable>, E> {
        let k = key(definition);
        if let Some(exe) = self
            .entries
            .borrow_mut()
            .get_mut(&k)
            .and_then(|e| e.variants.slot(kind).clone())
        {
            return Ok(exe);
        }

        // The map is not borrowed while building.
        let exe = build()?;
        self.builds.set(self.builds.get() + 1);
        debug!(
            computation = definition.name(),
            variant = %kind,
            label = exe.label(),
            "built variant"
        );

        let mut entries = self.entries.borrow_mut();
        let entry = entries.entry(k).or_insert_with(|| Entry {
            _definition: Rc::clone(definition),
            variants: VariantSet::default(),
        });
        Ok(entry.variants.slot(kind).get_or_insert(exe).clone())
    }
}
