use std::fmt;

use crate::migration::PropertyBag;

/// A migration step body: reads old field values from the bag and writes
/// into the already-deserialized current-shape entity.
pub type MigrationFn<T> = fn(&mut T, &PropertyBag);

/// One declared schema transition for an entity type.
pub struct MigrationStep<T> {
    from: u32,
    to: u32,
    apply: MigrationFn<T>,
}

impl<T> MigrationStep<T> {
    pub fn new(from: u32, to: u32, apply: MigrationFn<T>) -> Self {
        Self { from, to, apply }
    }

    pub fn from_version(&self) -> u32 {
        self.from
    }

    pub fn to_version(&self) -> u32 {
        self.to
    }

    pub(crate) fn apply(&self, entity: &mut T, bag: &PropertyBag) {
        (self.apply)(entity, bag)
    }
}

impl<T> Clone for MigrationStep<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MigrationStep<T> {}

impl<T> fmt::Debug for MigrationStep<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// The ordered list of migration steps an entity type declares.
///
/// Declaration order matters: when two chains to the current version have
/// the same length, the resolver keeps the one built from earlier-declared
/// steps.
///
/// # Example
///
/// ```
/// use entitykv::MigrationPlan;
///
/// struct Profile {
///     display_name: String,
/// }
///
/// let plan: MigrationPlan<Profile> = MigrationPlan::new().step(0, 1, |profile, bag| {
///     if let Some(name) = bag.try_get::<String>("name") {
///         profile.display_name = name;
///     }
/// });
/// assert_eq!(plan.len(), 1);
/// ```
pub struct MigrationPlan<T> {
    steps: Vec<MigrationStep<T>>,
}

impl<T> MigrationPlan<T> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Declares a step migrating `from` one version `to` another.
    #[must_use]
    pub fn step(mut self, from: u32, to: u32, apply: MigrationFn<T>) -> Self {
        self.steps.push(MigrationStep::new(from, to, apply));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn steps(&self) -> &[MigrationStep<T>] {
        &self.steps
    }
}

impl<T> Default for MigrationPlan<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MigrationPlan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationPlan")
            .field("steps", &self.steps)
            .finish()
    }
}
