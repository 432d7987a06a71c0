use crate::core::grid::GridIndex;
use std::collections::HashMap;

/// Named scalar arrays defined on the surface points, such as particle fluxes or coverages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointData {
    labels: Vec<String>,
    data: Vec<Vec<f64>>,
}

impl PointData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-filled arrays for each label.
    pub fn zeros<S: AsRef<str>>(labels: &[S], num_points: usize) -> Self {
        let mut point_data = Self::new();
        for label in labels {
            point_data.insert(label.as_ref(), vec![0.0; num_points]);
        }
        point_data
    }

    /// Adds an array, replacing any array stored under the same label.
    pub fn insert(&mut self, label: &str, values: Vec<f64>) {
        match self.position(label) {
            Some(slot) => self.data[slot] = values,
            None => {
                self.labels.push(label.to_string());
                self.data.push(values);
            }
        }
    }

    pub fn get(&self, label: &str) -> Option<&[f64]> {
        self.position(label).map(|slot| self.data[slot].as_slice())
    }

    pub fn get_mut(&mut self, label: &str) -> Option<&mut Vec<f64>> {
        self.position(label).map(move |slot| &mut self.data[slot])
    }

    /// Array stored under `label`, created zero-filled with `num_points` entries if missing.
    pub fn get_or_insert(&mut self, label: &str, num_points: usize) -> &mut Vec<f64> {
        let slot = match self.position(label) {
            Some(slot) => slot,
            None => {
                self.labels.push(label.to_string());
                self.data.push(vec![0.0; num_points]);
                self.data.len() - 1
            }
        };
        &mut self.data[slot]
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of arrays.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Length of the arrays, or 0 when there are none.
    pub fn num_points(&self) -> usize {
        self.data.first().map_or(0, Vec::len)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.data.iter().map(Vec::as_slice))
    }

    /// Resizes every array, filling new entries with zero.
    pub fn resize(&mut self, num_points: usize) {
        for values in &mut self.data {
            values.resize(num_points, 0.0);
        }
    }

    pub fn scale(&mut self, factor: f64) {
        for value in self.data.iter_mut().flatten() {
            *value *= factor;
        }
    }

    /// Appends all arrays of `other`.
    pub fn extend(&mut self, other: PointData) {
        for (label, values) in other.labels.into_iter().zip(other.data) {
            self.insert(&label, values);
        }
    }

    /// Carries values from points identified by `old_indices` onto `new_indices`.
    ///
    /// Points that existed before keep their value. New points take the mean of the old points
    /// in their surrounding stencil, or zero when there are none.
    pub fn remap(&self, old_indices: &[GridIndex], new_indices: &[GridIndex]) -> PointData {
        let lookup: HashMap<GridIndex, usize> = old_indices
            .iter()
            .enumerate()
            .map(|(slot, index)| (*index, slot))
            .collect();

        let sources: Vec<Vec<usize>> = new_indices
            .iter()
            .map(|index| match lookup.get(index) {
                Some(&slot) => vec![slot],
                None => stencil(index)
                    .filter_map(|n| lookup.get(&n).copied())
                    .collect(),
            })
            .collect();

        let data = self
            .data
            .iter()
            .map(|values| {
                sources
                    .iter()
                    .map(|slots| {
                        if slots.is_empty() {
                            0.0
                        } else {
                            slots.iter().map(|&s| values[s]).sum::<f64>() / slots.len() as f64
                        }
                    })
                    .collect()
            })
            .collect();

        PointData {
            labels: self.labels.clone(),
            data,
        }
    }

    fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}

fn stencil(center: &GridIndex) -> impl Iterator<Item = GridIndex> + '_ {
    (-1..=1).flat_map(move |dk| {
        (-1..=1).flat_map(move |dj| {
            (-1..=1).filter_map(move |di| {
                ((di, dj, dk) != (0, 0, 0))
                    .then(|| [center[0] + di, center[1] + dj, center[2] + dk])
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_existing_labels() {
        let mut data = PointData::new();
        data.insert("flux", vec![1.0, 2.0]);
        data.insert("coverage", vec![0.5, 0.5]);
        data.insert("flux", vec![3.0, 4.0]);

        assert_eq!(data.len(), 2);
        assert_eq!(data.get("flux"), Some(&[3.0, 4.0][..]));
        assert_eq!(data.labels(), &["flux".to_string(), "coverage".to_string()]);
        assert!(data.get("missing").is_none());
    }

    #[test]
    fn get_or_insert_creates_missing_arrays_only() {
        let mut data = PointData::new();
        data.insert("flux", vec![1.0, 2.0]);
        data.get_or_insert("flux", 5)[0] = 4.0;
        data.get_or_insert("coverage", 2)[1] = 0.5;
        assert_eq!(data.get("flux"), Some(&[4.0, 2.0][..]));
        assert_eq!(data.get("coverage"), Some(&[0.0, 0.5][..]));
    }

    #[test]
    fn resize_and_scale_apply_to_all_arrays() {
        let mut data = PointData::zeros(&["a", "b"], 2);
        data.get_mut("a").unwrap()[1] = 2.0;
        data.resize(3);
        data.scale(0.5);
        assert_eq!(data.get("a"), Some(&[0.0, 1.0, 0.0][..]));
        assert_eq!(data.num_points(), 3);
    }

    #[test]
    fn remap_keeps_values_of_surviving_points() {
        let mut data = PointData::new();
        data.insert("coverage", vec![0.1, 0.2, 0.3]);
        let old = [[0, 0, 0], [1, 0, 0], [2, 0, 0]];
        let new = [[2, 0, 0], [0, 0, 0]];

        let remapped = data.remap(&old, &new);
        assert_eq!(remapped.get("coverage"), Some(&[0.3, 0.1][..]));
    }

    #[test]
    fn remap_fills_new_points_from_their_neighbours() {
        let mut data = PointData::new();
        data.insert("coverage", vec![0.2, 0.4]);
        let old = [[0, 0, 0], [2, 0, 0]];
        let new = [[1, 1, 0], [7, 7, 0]];

        let remapped = data.remap(&old, &new);
        let values = remapped.get("coverage").unwrap();
        assert!((values[0] - 0.3).abs() < 1e-12);
        assert_eq!(values[1], 0.0);
    }
}
