use crate::algorithm::{assign_nearest, smooth_towards};
use crate::distance::nearest_centroid_squared;
use crate::error::KMeansError;
use crate::kmeans::{KMeans, ModelState, Phase};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use ndarray::{Array1, Array2};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Emitted for every accepted observation, before its centroid moves
#[derive(Debug, Clone, PartialEq)]
pub struct OnlineEvent {
    /// 0-based index of the centroid the observation was assigned to
    pub cluster: usize,
    pub observation: Array1<f64>,
}

/// Handle to a running online session.
///
/// The event stream is closed once the session stops consuming observations.
/// The model stays locked until finalization is over; [`wait`](Self::wait)
/// returns at that point.
pub struct OnlineSession {
    events: Receiver<OnlineEvent>,
    handle: JoinHandle<()>,
}

impl OnlineSession {
    /// Stream of assignment events. Delivery is synchronous: the session does
    /// not move a centroid until its event has been received (or the session
    /// has been waited on).
    pub fn events(&self) -> &Receiver<OnlineEvent> {
        &self.events
    }

    /// `true` once finalization is done and the model is unlocked
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the session has finalized and released the model.
    ///
    /// Undelivered events are discarded. Only returns after the done signal
    /// was sent (or the observation stream was disconnected).
    pub fn wait(self) {
        let OnlineSession { events, handle } = self;
        drop(events);

        if let Err(panic) = handle.join() {
            std::panic::resume_unwind(panic);
        }
    }
}

impl KMeans {
    /// Start an online training session.
    ///
    /// The model is locked exclusively before this returns. A background
    /// thread then takes observations one at a time in arrival order: each
    /// is matched to the centroid with the smallest squared distance, an
    /// [`OnlineEvent`] is delivered, and the centroid is moved towards the
    /// observation with `c = alpha * o + (1 - alpha) * c`. The observation is
    /// appended to the dataset.
    ///
    /// Once `done` fires (or every observation sender is dropped) observations
    /// already queued are still processed, the event stream is closed, every
    /// point of the dataset is assigned to its nearest centroid, and only then
    /// is the model unlocked. Observations sent after `done` are not guaranteed
    /// to be seen.
    ///
    /// # Errors
    ///
    /// - [`KMeansError::OnlineNotConfigured`] if [`with_online`](KMeans::with_online)
    ///   was never called
    /// - [`KMeansError::NotFitted`] if there are no centroids
    /// - [`KMeansError::InvalidDimensions`] if the existing dataset does not
    ///   match the centroid dimension
    pub fn online(
        &self,
        observations: Receiver<Array1<f64>>,
        done: Receiver<()>,
    ) -> Result<OnlineSession, KMeansError> {
        let shared = &self.shared;
        let mut guard = shared.state.write_arc();

        let online = guard.online.ok_or(KMeansError::OnlineNotConfigured)?;
        let dimension = guard
            .centroids
            .as_ref()
            .map(|centroids| centroids.ncols())
            .ok_or(KMeansError::NotFitted)?;

        if guard.data.ncols() != dimension {
            if guard.data.nrows() > 0 {
                return Err(KMeansError::InvalidDimensions(format!(
                    "Dataset has {} features, centroids have {}",
                    guard.data.ncols(),
                    dimension
                )));
            }
            guard.data = Array2::zeros((0, dimension));
        }

        guard.sizes = Array1::zeros(shared.config.k);
        shared.set_phase(Phase::Streaming);

        debug!(
            alpha = online.alpha,
            dimension,
            points = guard.data.nrows(),
            "online session started"
        );

        let (events_tx, events_rx) = bounded(0);
        let model = self.clone();

        let handle = thread::spawn(move || {
            let mut state = guard;
            let _phase = model.shared.enter(Phase::Streaming);

            model.consume(&mut state, online.alpha, &observations, &done, &events_tx);
            drop(events_tx);

            model.shared.set_phase(Phase::Finalizing);
            model.finalize(&mut state);
        });

        Ok(OnlineSession {
            events: events_rx,
            handle,
        })
    }

    fn consume(
        &self,
        state: &mut ModelState,
        alpha: f64,
        observations: &Receiver<Array1<f64>>,
        done: &Receiver<()>,
        events: &Sender<OnlineEvent>,
    ) {
        let ModelState {
            data, centroids, ..
        } = state;
        let Some(centroids) = centroids.as_mut() else {
            return;
        };

        let mut accepted = 0usize;
        loop {
            let observation = select! {
                recv(observations) -> msg => msg.ok(),
                recv(done) -> _ => None,
            };
            match observation {
                Some(observation) => {
                    accepted += self.observe(data, centroids, observation, alpha, events) as usize
                }
                None => break,
            }
        }

        // Observations queued before the done signal still count
        for observation in observations.try_iter() {
            accepted += self.observe(data, centroids, observation, alpha, events) as usize;
        }

        debug!(accepted, "online session stopped consuming");
    }

    /// Returns `false` if the observation was rejected
    fn observe(
        &self,
        data: &mut Array2<f64>,
        centroids: &mut Array2<f64>,
        observation: Array1<f64>,
        alpha: f64,
        events: &Sender<OnlineEvent>,
    ) -> bool {
        if observation.len() != centroids.ncols() {
            warn!(
                expected = centroids.ncols(),
                got = observation.len(),
                "dropping observation with wrong dimension"
            );
            return false;
        }

        let (cluster, _) = nearest_centroid_squared(
            self.shared.distance.as_ref(),
            observation.view(),
            &centroids.view(),
        );

        // A dropped receiver just means nobody listens any more
        let _ = events.send(OnlineEvent {
            cluster,
            observation: observation.clone(),
        });

        smooth_towards(centroids.row_mut(cluster), observation.view(), alpha);

        if let Err(err) = data.push_row(observation.view()) {
            warn!(%err, "could not append observation to the dataset");
        }
        true
    }

    fn finalize(&self, state: &mut ModelState) {
        if let Some(centroids) = state.centroids.as_ref() {
            let (assignments, sizes) = assign_nearest(
                &state.data.view(),
                &centroids.view(),
                self.shared.distance.as_ref(),
            );
            state.assignments = assignments;
            state.sizes = sizes;
        }

        debug!(points = state.data.nrows(), "online session finalized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KMeansConfig, OnlineConfig};
    use crate::distance::{Distance, Euclidean};
    use crossbeam_channel::unbounded;
    use ndarray::array;
    use std::time::Duration;

    fn online_model(k: usize, alpha: f64, dimension: usize) -> KMeans {
        KMeans::with_config(KMeansConfig::new(k).with_seed(3))
            .unwrap()
            .with_online(OnlineConfig::new(alpha, dimension))
            .unwrap()
    }

    #[test]
    fn test_single_observation_update() {
        let alpha = 0.3;
        let kmeans = online_model(3, alpha, 2);
        let before = kmeans.centroids().unwrap();

        let (obs_tx, obs_rx) = unbounded();
        let (done_tx, done_rx) = unbounded();
        let session = kmeans.online(obs_rx, done_rx).unwrap();

        let o = array![1.5, -2.0];
        obs_tx.send(o.clone()).unwrap();
        let event = session.events().recv().unwrap();

        let expected_cluster = (0..3)
            .min_by(|&a, &b| {
                let da = Euclidean.distance(o.view(), before.row(a)).powi(2);
                let db = Euclidean.distance(o.view(), before.row(b)).powi(2);
                da.partial_cmp(&db).unwrap()
            })
            .unwrap();
        assert_eq!(event.cluster, expected_cluster);
        assert_eq!(event.observation, o);

        done_tx.send(()).unwrap();
        session.wait();

        let after = kmeans.centroid(event.cluster + 1).unwrap();
        let old = before.row(event.cluster);
        for i in 0..2 {
            assert_eq!(after[i], alpha * o[i] + (1.0 - alpha) * old[i]);
        }
        for j in (0..3).filter(|&j| j != event.cluster) {
            assert_eq!(kmeans.centroid(j + 1).unwrap(), before.row(j));
        }
    }

    #[test]
    fn test_alpha_one_jumps_to_observation() {
        let kmeans = online_model(2, 1.0, 2);

        let (obs_tx, obs_rx) = unbounded();
        let (done_tx, done_rx) = unbounded();
        let session = kmeans.online(obs_rx, done_rx).unwrap();

        obs_tx.send(array![0.25, 0.75]).unwrap();
        let event = session.events().recv().unwrap();
        done_tx.send(()).unwrap();
        session.wait();

        assert_eq!(kmeans.centroid(event.cluster + 1).unwrap(), array![0.25, 0.75]);
    }

    #[test]
    fn test_finalization_assigns_every_point() {
        let kmeans = online_model(2, 0.5, 1);

        let (obs_tx, obs_rx) = unbounded();
        let (done_tx, done_rx) = unbounded();
        let session = kmeans.online(obs_rx, done_rx).unwrap();

        for x in [-4.0, -3.5, 4.0, 3.5, -4.2, 4.1] {
            obs_tx.send(array![x]).unwrap();
        }
        done_tx.send(()).unwrap();

        let events: Vec<OnlineEvent> = session.events().iter().collect();
        assert_eq!(events.len(), 6);
        session.wait();

        let assignments = kmeans.assignments();
        assert_eq!(assignments.len(), 6);
        assert!(assignments.iter().all(|&a| a == 1 || a == 2));
        assert_eq!(kmeans.sizes().sum(), 6);
        assert_eq!(kmeans.dataset_len(), 6);
        assert_eq!(kmeans.phase(), Phase::Idle);
    }

    #[test]
    fn test_queries_wait_for_finalization() {
        let kmeans = online_model(2, 0.5, 2);

        let (obs_tx, obs_rx) = unbounded();
        let (done_tx, done_rx) = unbounded();
        let session = kmeans.online(obs_rx, done_rx).unwrap();
        assert_eq!(kmeans.phase(), Phase::Streaming);

        let (sizes_tx, sizes_rx) = bounded(1);
        let reader = {
            let kmeans = kmeans.clone();
            thread::spawn(move || sizes_tx.send(kmeans.sizes()).unwrap())
        };

        obs_tx.send(array![1.0, 1.0]).unwrap();
        obs_tx.send(array![-1.0, -1.0]).unwrap();
        assert_eq!(session.events().iter().take(2).count(), 2);

        // Still streaming, so the reader must be blocked
        assert!(sizes_rx.recv_timeout(Duration::from_millis(50)).is_err());

        done_tx.send(()).unwrap();
        let sizes = sizes_rx.recv().unwrap();
        assert_eq!(sizes.sum(), 2);

        reader.join().unwrap();
        session.wait();
    }

    #[test]
    fn test_disconnected_stream_finishes_session() {
        let kmeans = online_model(2, 0.5, 1);

        let (obs_tx, obs_rx) = unbounded();
        let (_done_tx, done_rx) = unbounded::<()>();
        let session = kmeans.online(obs_rx, done_rx).unwrap();

        obs_tx.send(array![2.0]).unwrap();
        drop(obs_tx);

        assert_eq!(session.events().iter().count(), 1);
        session.wait();
        assert_eq!(kmeans.assignments().len(), 1);
    }

    #[test]
    fn test_wrong_dimension_is_dropped() {
        let kmeans = online_model(2, 0.5, 2);

        let (obs_tx, obs_rx) = unbounded();
        let (done_tx, done_rx) = unbounded();
        let session = kmeans.online(obs_rx, done_rx).unwrap();

        obs_tx.send(array![1.0, 2.0, 3.0]).unwrap();
        obs_tx.send(array![1.0, 2.0]).unwrap();
        done_tx.send(()).unwrap();

        let events: Vec<OnlineEvent> = session.events().iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].observation, array![1.0, 2.0]);
        session.wait();
        assert_eq!(kmeans.dataset_len(), 1);
    }

    #[test]
    fn test_online_requires_configuration() {
        let kmeans = KMeans::new(5, 2).unwrap();
        let (_obs_tx, obs_rx) = unbounded();
        let (_done_tx, done_rx) = unbounded();

        let result = kmeans.online(obs_rx, done_rx);
        assert!(matches!(result, Err(KMeansError::OnlineNotConfigured)));
        assert_eq!(kmeans.phase(), Phase::Idle);
    }

    #[test]
    fn test_online_continues_from_batch_centroids() {
        let kmeans = online_model(2, 0.1, 2);
        let data = array![[0.0, 0.0], [0.0, 1.0], [100.0, 0.0], [100.0, 1.0]];
        kmeans.learn(&data.view()).unwrap();
        let learned = kmeans.centroids().unwrap();

        let (obs_tx, obs_rx) = unbounded();
        let (done_tx, done_rx) = unbounded();
        let session = kmeans.online(obs_rx, done_rx).unwrap();

        obs_tx.send(array![100.0, 0.5]).unwrap();
        let event = session.events().recv().unwrap();
        assert_eq!(learned.row(event.cluster)[0], 100.0);

        done_tx.send(()).unwrap();
        session.wait();

        assert_eq!(kmeans.dataset_len(), 5);
        let assignments = kmeans.assignments();
        assert_eq!(assignments.len(), 5);
        assert_eq!(assignments[4], assignments[2]);
        assert_eq!(kmeans.sizes().sum(), 5);
    }
}
