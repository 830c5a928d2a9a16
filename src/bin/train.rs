//! Offline training for the match model artifact
//!
//! Builds a text corpus from stored profiles plus the raw-text ingestion
//! service, fits the cluster model, derives labeled pairs from the existing
//! relationship graph (mutual pair = positive), fits the classifier, and
//! writes the artifact the server loads at startup.

use std::sync::Arc;

use tracing::{info, warn};

use ember_match::config::Settings;
use ember_match::core::classifier::feature_vector;
use ember_match::core::{ClusterModel, MatchClassifier, MetadataAnalyzer, ModelArtifact};
use ember_match::models::Profile;
use ember_match::services::{
    ProfileStore, RawTextClient, RelationshipStore, PostgresClient,
};

const CANDIDATE_BATCH: usize = 10_000;
const MIN_TRAINING_PAIRS: usize = 20;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt().with_target(false).init();

    let settings = Settings::load()?;

    let postgres = Arc::new(
        PostgresClient::from_settings(
            &settings.database.url,
            settings.database.max_connections,
            settings.database.min_connections,
        )
        .await?,
    );

    let social = RawTextClient::new(settings.social.endpoint.clone(), settings.social.api_key.clone());

    let profiles = postgres.list_candidates("", CANDIDATE_BATCH).await?;
    if profiles.is_empty() {
        warn!("no profiles available, nothing to train");
        return Ok(());
    }
    info!("training on {} profiles", profiles.len());

    // Corpus: profile text enriched with ingested raw text where available
    let mut corpus = Vec::with_capacity(profiles.len());
    for profile in &profiles {
        let mut text = ember_match::core::metadata::profile_text(profile);
        match social.get_raw_text(&profile.id).await {
            Ok(raw) if !raw.is_empty() => {
                text.push(' ');
                text.push_str(&raw);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(profile = %profile.id, "no raw text: {}", e);
            }
        }
        corpus.push(text);
    }

    let cluster = match ClusterModel::fit(&corpus) {
        Ok(model) => {
            info!("cluster model fitted ({} clusters)", model.cluster_count());
            Some(model)
        }
        Err(e) => {
            warn!("cluster fit failed: {}", e);
            None
        }
    };

    let analyzer = MetadataAnalyzer::new(cluster.clone().map(Arc::new));

    let classifier = fit_classifier(&postgres, &analyzer, &profiles).await?;

    let artifact = ModelArtifact {
        trained_at: chrono::Utc::now(),
        cluster,
        classifier: classifier.as_ref().and_then(|c| c.fitted_state().cloned()),
    };

    artifact.save(&settings.model.path)?;
    info!("artifact written to {}", settings.model.path);

    Ok(())
}

/// Derive labeled pairs from the relationship graph and fit the classifier
///
/// Every stored edge is an example: positive when the reverse direction is
/// also positive (a mutual pair), negative otherwise.
async fn fit_classifier(
    store: &Arc<PostgresClient>,
    analyzer: &MetadataAnalyzer,
    profiles: &[Profile],
) -> Result<Option<MatchClassifier>, Box<dyn std::error::Error>> {
    let insights: std::collections::HashMap<&str, _> = profiles
        .iter()
        .map(|p| (p.id.as_str(), analyzer.analyze(p)))
        .collect();
    let by_id: std::collections::HashMap<&str, &Profile> =
        profiles.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut features = Vec::new();
    let mut labels = Vec::new();

    for profile in profiles {
        let edges = store.edges_from(&profile.id).await?;
        for edge in edges {
            let (Some(user), Some(candidate)) =
                (by_id.get(edge.from_id.as_str()), by_id.get(edge.to_id.as_str()))
            else {
                continue;
            };

            let reverse = store.get_edge(&edge.to_id, &edge.from_id).await?;
            let mutual = edge.status.is_positive()
                && reverse.is_some_and(|r| r.status.is_positive());

            features.push(feature_vector(
                user,
                &insights[edge.from_id.as_str()],
                candidate,
                &insights[edge.to_id.as_str()],
            ));
            labels.push(mutual);
        }
    }

    if features.len() < MIN_TRAINING_PAIRS {
        warn!(
            "only {} labeled pairs (need {}), skipping classifier",
            features.len(),
            MIN_TRAINING_PAIRS
        );
        return Ok(None);
    }

    let positives = labels.iter().filter(|&&l| l).count();
    if positives == 0 || positives == labels.len() {
        warn!("single-class training set, skipping classifier");
        return Ok(None);
    }

    let mut classifier = MatchClassifier::new();
    classifier.fit(&features, &labels)?;
    info!(
        "classifier fitted on {} pairs ({} positive)",
        labels.len(),
        positives
    );

    Ok(Some(classifier))
}
