use std::sync::Arc;

use thiserror::Error;

use super::{
    ActionGroup, ErrorHook, GROUP_BUILD, GROUP_FINALIZE, GROUP_INITIALIZE, Phase, Pipeline,
    SpaServices,
    phases::{DefaultPhase, html_error_hook},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineBuildError {
    #[error("unknown action group `{0}`")]
    UnknownGroup(String),
    #[error("unknown phase `{0}`")]
    UnknownPhase(String),
}

/// Assembles a [`Pipeline`] from named phases.
///
/// Editing methods chain; the first failed edit is reported by
/// [`PipelineBuilder::build`].
pub struct PipelineBuilder {
    services: SpaServices,
    groups: Vec<ActionGroup>,
    error_hook: Option<ErrorHook>,
    error: Option<PipelineBuildError>,
}

impl PipelineBuilder {
    /// The three standard groups without any phases.
    pub fn new(services: SpaServices) -> Self {
        let groups = vec![
            ActionGroup::always(GROUP_INITIALIZE),
            ActionGroup::new(GROUP_BUILD, Arc::new(|ctx| ctx.data_model.is_none())),
            ActionGroup::always(GROUP_FINALIZE),
        ];
        Self {
            services,
            groups,
            error_hook: None,
            error: None,
        }
    }

    /// Standard groups filled with the default phases and the HTML
    /// diagnostic error hook.
    pub fn spa_defaults(services: SpaServices) -> Self {
        let mut builder = Self::new(services).on_error(Arc::new(html_error_hook));
        for phase in DefaultPhase::ALL {
            builder = builder.append(phase.group(), Arc::new(phase));
        }
        builder
    }

    pub fn replace(self, name: &str, phase: Arc<dyn Phase>) -> Self {
        self.edit(name, |phases, index| phases[index] = phase)
    }

    pub fn remove(self, name: &str) -> Self {
        self.edit(name, |phases, index| {
            phases.remove(index);
        })
    }

    pub fn insert_before(self, anchor: &str, phase: Arc<dyn Phase>) -> Self {
        self.edit(anchor, |phases, index| phases.insert(index, phase))
    }

    pub fn insert_after(self, anchor: &str, phase: Arc<dyn Phase>) -> Self {
        self.edit(anchor, |phases, index| phases.insert(index + 1, phase))
    }

    pub fn append(mut self, group: &str, phase: Arc<dyn Phase>) -> Self {
        if self.error.is_some() {
            return self;
        }
        match self.groups.iter_mut().find(|g| g.name == group) {
            Some(group) => group.phases.push(phase),
            None => self.error = Some(PipelineBuildError::UnknownGroup(group.to_string())),
        }
        self
    }

    pub fn on_error(mut self, hook: ErrorHook) -> Self {
        self.error_hook = Some(hook);
        self
    }

    /// Drop the error hook so phase failures always propagate.
    pub fn without_error_hook(mut self) -> Self {
        self.error_hook = None;
        self
    }

    pub fn build(self) -> Result<Pipeline, PipelineBuildError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(Pipeline {
            groups: self.groups,
            error_hook: self.error_hook,
            services: self.services,
        })
    }

    fn edit<F>(mut self, name: &str, apply: F) -> Self
    where
        F: FnOnce(&mut Vec<Arc<dyn Phase>>, usize),
    {
        if self.error.is_some() {
            return self;
        }
        let found = self.groups.iter_mut().find_map(|group| {
            group
                .phases
                .iter()
                .position(|phase| phase.name() == name)
                .map(|index| (group, index))
        });
        match found {
            Some((group, index)) => apply(&mut group.phases, index),
            None => self.error = Some(PipelineBuildError::UnknownPhase(name.to_string())),
        }
        self
    }
}
