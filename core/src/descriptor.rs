use crate::KeyPoint;

/// A floating-point feature vector tied to the keypoint it describes.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub data: Vec<f32>,
    pub keypoint: KeyPoint,
}

impl Descriptor {
    pub fn new(data: Vec<f32>, keypoint: KeyPoint) -> Self {
        Self { data, keypoint }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn squared_l2_distance(&self, other: &Descriptor) -> f32 {
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Descriptors {
    pub descriptors: Vec<Descriptor>,
}

impl Descriptors {
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
        }
    }

    pub fn push(&mut self, desc: Descriptor) {
        self.descriptors.push(desc);
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter()
    }
}

impl FromIterator<Descriptor> for Descriptors {
    fn from_iter<I: IntoIterator<Item = Descriptor>>(iter: I) -> Self {
        Self {
            descriptors: iter.into_iter().collect(),
        }
    }
}
