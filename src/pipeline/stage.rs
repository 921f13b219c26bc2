// Copyright @yucwang 2026

/// Named resources the compute stages bind. The scheduler only cares about
/// identity, not contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceId {
    RawVolume,
    SigmaVolume,
    TransferLut,
    OpacityLut,
    ClearcoatLut,
    Cubemap,
    RayPosTex,
    RayDirTex,
    AccumTex,
    ImgOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageId {
    Precompute,
    MipGen,
    GenRays,
    Raymarch,
    ConeTrace,
    Resolve,
}

/// One compute stage with its declared binding sets. Barriers are derived
/// from these instead of sprinkled by hand next to each dispatch.
#[derive(Debug, Clone, Copy)]
pub struct StageDesc {
    pub id: StageId,
    pub reads: &'static [ResourceId],
    pub writes: &'static [ResourceId],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassCmd {
    Dispatch(StageId),
    Barrier,
}

/// Compile a stage list into a command list, inserting a barrier wherever an
/// unfenced earlier write would be visible to a later read or write of the
/// same resource. A trailing barrier covers the host reading the final
/// output.
pub fn compile(stages: &[StageDesc]) -> Vec<PassCmd> {
    let mut commands = Vec::new();
    let mut unfenced: Vec<ResourceId> = Vec::new();

    for stage in stages {
        let hazard = stage.reads.iter()
            .chain(stage.writes.iter())
            .any(|resource| unfenced.contains(resource));
        if hazard {
            commands.push(PassCmd::Barrier);
            unfenced.clear();
        }
        commands.push(PassCmd::Dispatch(stage.id));
        for write in stage.writes {
            if !unfenced.contains(write) {
                unfenced.push(*write);
            }
        }
    }

    if !unfenced.is_empty() {
        commands.push(PassCmd::Barrier);
    }

    commands
}
