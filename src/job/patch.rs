// src/job/patch.rs

//! Extending a job's lifecycle without touching its type.
//!
//! A [`Patched`] job owns a base job plus an ordered list of [`Patch`]es.
//! Each lifecycle call runs the base implementation first, then every
//! patch's hook for the same stage with mutable access to the base job and
//! the same inputs. Identity, declared dependencies and output are the base
//! job's, so the runner cannot tell a patched job from its base.

use std::fmt;

use serde_json::Value;

use super::{Dependencies, Inputs, Job};

/// Extra behaviour for one or more lifecycle stages of a `J`.
///
/// State a patch needs (thresholds, scale factors, ...) lives on the patch
/// itself. Unimplemented hooks are no-ops.
pub trait Patch<J>: Send {
    fn extract(&mut self, _job: &mut J) -> anyhow::Result<()> {
        Ok(())
    }

    fn transform(&mut self, _job: &mut J, _inputs: &Inputs) -> anyhow::Result<()> {
        Ok(())
    }

    fn load(&mut self, _job: &mut J) -> anyhow::Result<()> {
        Ok(())
    }

    fn cache(&mut self, _job: &mut J) -> anyhow::Result<()> {
        Ok(())
    }

    fn uncache(&mut self, _job: &mut J) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A base job composed with an ordered list of patches.
pub struct Patched<J> {
    base: J,
    patches: Vec<Box<dyn Patch<J>>>,
}

impl<J: Job> Patched<J> {
    pub fn new(base: J) -> Self {
        Self {
            base,
            patches: Vec::new(),
        }
    }

    /// Append a patch; patches run in the order they were added.
    pub fn with(mut self, patch: impl Patch<J> + 'static) -> Self {
        self.patches.push(Box::new(patch));
        self
    }

    pub fn base(&self) -> &J {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut J {
        &mut self.base
    }

    pub fn patch_count(&self) -> usize {
        self.patches.len()
    }

    pub fn into_base(self) -> J {
        self.base
    }
}

impl<J: Job> Job for Patched<J> {
    fn id(&self) -> &str {
        self.base.id()
    }

    fn dependencies(&self) -> Dependencies {
        self.base.dependencies()
    }

    fn extract(&mut self) -> anyhow::Result<()> {
        self.base.extract()?;
        for patch in self.patches.iter_mut() {
            patch.extract(&mut self.base)?;
        }
        Ok(())
    }

    fn transform(&mut self, inputs: &Inputs) -> anyhow::Result<()> {
        self.base.transform(inputs)?;
        for patch in self.patches.iter_mut() {
            patch.transform(&mut self.base, inputs)?;
        }
        Ok(())
    }

    fn load(&mut self) -> anyhow::Result<()> {
        self.base.load()?;
        for patch in self.patches.iter_mut() {
            patch.load(&mut self.base)?;
        }
        Ok(())
    }

    fn cache(&mut self) -> anyhow::Result<()> {
        self.base.cache()?;
        for patch in self.patches.iter_mut() {
            patch.cache(&mut self.base)?;
        }
        Ok(())
    }

    fn uncache(&mut self) -> anyhow::Result<()> {
        self.base.uncache()?;
        for patch in self.patches.iter_mut() {
            patch.uncache(&mut self.base)?;
        }
        Ok(())
    }

    fn output(&self) -> Option<&Value> {
        self.base.output()
    }
}

impl<J: fmt::Debug> fmt::Debug for Patched<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patched")
            .field("base", &self.base)
            .field("patches", &self.patches.len())
            .finish()
    }
}
