use indexmap::IndexMap;

use super::types::Pipeline;

/// Collapse a pipeline listing to the single most recent pipeline per
/// commit, keyed by sha.
///
/// Recency is the numeric pipeline id; a later record replaces an earlier
/// one only when its id is strictly larger. One pass over the input.
pub fn dedupe_pipelines(pipelines: Vec<Pipeline>) -> IndexMap<String, Pipeline> {
    let mut deduped: IndexMap<String, Pipeline> = IndexMap::with_capacity(pipelines.len());

    for pipeline in pipelines {
        match deduped.get_mut(&pipeline.sha) {
            Some(existing) => {
                if pipeline.id > existing.id {
                    *existing = pipeline;
                }
            }
            None => {
                deduped.insert(pipeline.sha.clone(), pipeline);
            }
        }
    }

    deduped
}
