//! The multi-branch room scoring network.
//!
//! ```text
//! image (3×64×64) ─ 4 × [conv3×3 ─ BN ─ ReLU ─ maxpool2] ─ GAP ─ [bottleneck]   ─┐
//! scalars ┬ room-type embedding ┬ [apartment embedding] ─ concat ─ [projection] ─┼─ concat ─ FC ─ ReLU ─ dropout ─ FC → raw score
//!         └──────────────── raw tabular vector (skip) ────────────────────────────┘
//! ```
//!
//! Bracketed stages exist only when the [`ModelSpec`] asks for them.

use burn::{
    module::Module,
    nn::{
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Embedding, EmbeddingConfig,
        Initializer, Linear, LinearConfig, PaddingConfig2d,
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
    },
    prelude::Backend,
    tensor::{Int, Tensor, TensorData, activation::relu},
};
use furnisher_geometry::{ApartmentType, RoomType};
use furnisher_raster::{IMG_SIZE, RasterImage};

use crate::spec::{CONV_CHANNELS, CategoricalInput, ModelSpec, ModelSpecError};

#[derive(Module, Debug)]
struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
    pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    fn new(
        in_channels: usize,
        out_channels: usize,
        init: Option<&Initializer>,
        device: &B::Device,
    ) -> Self {
        let config = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1));
        let config = match init {
            Some(init) => config.with_initializer(init.clone()),
            None => config,
        };
        Self {
            conv: config.init(device),
            norm: BatchNormConfig::new(out_channels).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pool.forward(relu(self.norm.forward(self.conv.forward(x))))
    }
}

fn linear<B: Backend>(
    d_input: usize,
    d_output: usize,
    init: Option<&Initializer>,
    device: &B::Device,
) -> Linear<B> {
    let config = LinearConfig::new(d_input, d_output);
    match init {
        Some(init) => config.with_initializer(init.clone()),
        None => config,
    }
    .init(device)
}

/// Embedding tables have no fan, so fan-scaled initializers fall back to the
/// default `N(0, 1)`.
fn embedding<B: Backend>(
    n: usize,
    d: usize,
    init: Option<&Initializer>,
    device: &B::Device,
) -> Embedding<B> {
    let config = EmbeddingConfig::new(n, d);
    match init {
        Some(init) if !needs_fan(init) => config.with_initializer(init.clone()),
        _ => config,
    }
    .init(device)
}

fn needs_fan(init: &Initializer) -> bool {
    matches!(
        init,
        Initializer::KaimingUniform { .. }
            | Initializer::KaimingNormal { .. }
            | Initializer::XavierUniform { .. }
            | Initializer::XavierNormal { .. }
    )
}

/// Network built from a [`ModelSpec`].
#[derive(Module, Debug)]
pub struct RoomNet<B: Backend> {
    blocks: Vec<ConvBlock<B>>,
    gap: AdaptiveAvgPool2d,
    image_fc: Option<Linear<B>>,
    room_embed: Embedding<B>,
    apt_embed: Option<Embedding<B>>,
    tabular_fc: Option<Linear<B>>,
    head_hidden: Linear<B>,
    dropout: Dropout,
    head_out: Linear<B>,
    tabular_skip: bool,
}

/// Builds the network described by `spec` with the default initializers.
pub fn build_network<B: Backend>(
    spec: &ModelSpec,
    device: &B::Device,
) -> Result<RoomNet<B>, ModelSpecError> {
    RoomNet::new(spec, None, device)
}

/// Builds the network with every weight and bias drawn from `init`.
///
/// Batch-norm layers keep their identity initialization, and embeddings keep
/// theirs when `init` is scaled by fan-in or fan-out.
pub fn build_network_with<B: Backend>(
    spec: &ModelSpec,
    init: &Initializer,
    device: &B::Device,
) -> Result<RoomNet<B>, ModelSpecError> {
    RoomNet::new(spec, Some(init), device)
}

impl<B: Backend> RoomNet<B> {
    fn new(
        spec: &ModelSpec,
        init: Option<&Initializer>,
        device: &B::Device,
    ) -> Result<Self, ModelSpecError> {
        spec.validate()?;

        let mut in_channels = RasterImage::CHANNELS;
        let blocks = CONV_CHANNELS
            .iter()
            .map(|&out_channels| {
                let block = ConvBlock::new(in_channels, out_channels, init, device);
                in_channels = out_channels;
                block
            })
            .collect();

        let image_fc = spec
            .image_bottleneck
            .map(|d| linear(in_channels, d, init, device));
        let apt_embed = spec
            .apt_embed_dim
            .map(|d| embedding(spec.n_apt_types, d, init, device));
        let tabular_fc = spec
            .tabular_hidden
            .map(|d| linear(spec.tabular_raw_dim(), d, init, device));

        Ok(Self {
            blocks,
            gap: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            image_fc,
            room_embed: embedding(RoomType::LEN, spec.embed_dim, init, device),
            apt_embed,
            tabular_fc,
            head_hidden: linear(spec.fusion_dim(), spec.fc_hidden, init, device),
            dropout: DropoutConfig::new(spec.dropout).init(),
            head_out: linear(spec.fc_hidden, 1, init, device),
            tabular_skip: spec.tabular_skip,
        })
    }

    /// Raw scores for a batch.
    ///
    /// - `images`: `[batch, 3, 64, 64]`, values in `[0, 1]`
    /// - `room_types`, `apartment_types`: `[batch, 1]` category indices
    /// - `tabular`: `[batch, n_features]`
    ///
    /// Returns `[batch, 1]`.
    pub fn forward(
        &self,
        images: Tensor<B, 4>,
        room_types: Tensor<B, 2, Int>,
        apartment_types: Tensor<B, 2, Int>,
        tabular: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let [batch, ..] = images.dims();

        let mut x = images;
        for block in &self.blocks {
            x = block.forward(x);
        }
        let [_, channels, ..] = x.dims();
        let mut image = self.gap.forward(x).reshape([batch, channels]);
        if let Some(fc) = &self.image_fc {
            image = relu(fc.forward(image));
        }

        let room = self.room_embed.forward(room_types);
        let [_, _, room_dim] = room.dims();
        let mut parts = vec![tabular, room.reshape([batch, room_dim])];
        if let Some(embed) = &self.apt_embed {
            let apt = embed.forward(apartment_types);
            let [_, _, apt_dim] = apt.dims();
            parts.push(apt.reshape([batch, apt_dim]));
        }
        let tabular_raw = Tensor::cat(parts, 1);
        let tabular = match &self.tabular_fc {
            Some(fc) => relu(fc.forward(tabular_raw.clone())),
            None => tabular_raw.clone(),
        };

        let mut fused = vec![image, tabular];
        if self.tabular_skip {
            fused.push(tabular_raw);
        }
        let x = relu(self.head_hidden.forward(Tensor::cat(fused, 1)));
        self.head_out.forward(self.dropout.forward(x))
    }

    /// Raw score for a single room.
    pub fn forward_one(
        &self,
        image: &RasterImage,
        categories: CategoricalInput,
        tabular: Vec<f32>,
        device: &B::Device,
    ) -> Tensor<B, 2> {
        let n_features = tabular.len();
        let images = Tensor::from_data(
            TensorData::new(image.to_unit_f32(), [1, RasterImage::CHANNELS, IMG_SIZE, IMG_SIZE]),
            device,
        );
        debug_assert!(categories.room_type.index() < RoomType::LEN);
        debug_assert!(categories.apartment_type.index() < ApartmentType::LEN);
        #[expect(clippy::cast_possible_wrap)]
        let index = |i: usize| {
            Tensor::<B, 2, Int>::from_data(TensorData::new(vec![i as i64], [1, 1]), device)
        };
        let tabular = Tensor::from_data(TensorData::new(tabular, [1, n_features]), device);
        self.forward(
            images,
            index(categories.room_type.index()),
            index(categories.apartment_type.index()),
            tabular,
        )
    }
}

#[cfg(test)]
mod tests {
    use burn_ndarray::NdArray;

    use super::*;
    use crate::{spec::ArchitectureRegistry, testing::normalization};

    type TestBackend = NdArray<f32>;

    fn spec(name: &str) -> ModelSpec {
        ArchitectureRegistry::builtin()
            .get(name)
            .unwrap()
            .clone()
            .with_normalization(normalization())
    }

    fn categories() -> CategoricalInput {
        CategoricalInput {
            room_type: RoomType::Kitchen,
            apartment_type: ApartmentType::ThreeBedroom,
        }
    }

    #[test]
    fn test_every_builtin_architecture_runs() {
        let device = Default::default();
        let registry = ArchitectureRegistry::builtin();
        for name in registry.names() {
            let spec = spec(name);
            let net = build_network::<TestBackend>(&spec, &device).unwrap();
            let images = Tensor::zeros([2, 3, 64, 64], &device);
            let rooms = Tensor::<TestBackend, 2, Int>::zeros([2, 1], &device);
            let apts = Tensor::<TestBackend, 2, Int>::zeros([2, 1], &device);
            let tabular = Tensor::zeros([2, spec.features.len()], &device);
            let out = net.forward(images, rooms, apts, tabular);
            assert_eq!(out.dims(), [2, 1], "{name}");
        }
    }

    #[test]
    fn test_fan_scaled_initializers_build_every_architecture() {
        let device = Default::default();
        let inits = [
            Initializer::KaimingUniform {
                gain: 1.0,
                fan_out_only: false,
            },
            Initializer::KaimingNormal {
                gain: 1.0,
                fan_out_only: true,
            },
            Initializer::XavierUniform { gain: 1.0 },
            Initializer::XavierNormal { gain: 1.0 },
        ];
        for init in &inits {
            for name in ArchitectureRegistry::builtin().names() {
                let spec = spec(name);
                let net = build_network_with::<TestBackend>(&spec, init, &device).unwrap();
                let tabular = vec![0.1; spec.features.len()];
                let raw = net
                    .forward_one(&RasterImage::blank(), categories(), tabular, &device)
                    .into_data()
                    .to_vec::<f32>()
                    .unwrap();
                assert!(raw[0].is_finite(), "{name} with {init:?}");
            }
        }
    }

    #[test]
    fn test_every_category_index_is_embedded() {
        let device = Default::default();
        let spec = spec("cnn-v4");
        let net = build_network_with::<TestBackend>(
            &spec,
            &Initializer::Uniform {
                min: -0.5,
                max: 0.5,
            },
            &device,
        )
        .unwrap();
        let mut outputs = vec![];
        for room_type in RoomType::ALL {
            for apartment_type in ApartmentType::ALL {
                let categories = CategoricalInput {
                    room_type,
                    apartment_type,
                };
                let raw = net
                    .forward_one(&RasterImage::blank(), categories, vec![0.0; 5], &device)
                    .into_data()
                    .to_vec::<f32>()
                    .unwrap();
                outputs.push(raw[0]);
            }
        }
        assert_eq!(outputs.len(), RoomType::LEN * ApartmentType::LEN);
        // the last category must not alias the first one
        assert_ne!(outputs.first(), outputs.last());
    }

    #[test]
    fn test_invalid_spec_fails_fast() {
        let device = Default::default();
        let bad = ModelSpec {
            fc_hidden: 0,
            ..spec("cnn-v1")
        };
        assert!(matches!(
            build_network::<TestBackend>(&bad, &device),
            Err(ModelSpecError::ZeroWidth { field: "fc_hidden" })
        ));
    }

    #[test]
    fn test_zero_weights_give_zero_output() {
        let device = Default::default();
        let spec = spec("cnn-v3");
        let net = build_network_with::<TestBackend>(&spec, &Initializer::Zeros, &device).unwrap();
        let out = net.forward_one(&RasterImage::blank(), categories(), vec![1.0; 5], &device);
        let values = out.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![0.0]);
    }

    #[test]
    fn test_forward_is_deterministic() {
        let device = Default::default();
        let spec = spec("cnn-v4");
        let net = build_network::<TestBackend>(&spec, &device).unwrap();
        let mut image = RasterImage::blank();
        image.set(furnisher_raster::Channel::Mask, 10, 10, 255);
        let run = || {
            net.forward_one(&image, categories(), vec![0.5, 0.1, 0.9, -1.0, 2.0], &device)
                .into_data()
                .to_vec::<f32>()
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_apartment_type_ignored_without_embedding() {
        let device = Default::default();
        let spec = spec("cnn-v2");
        let net = build_network::<TestBackend>(&spec, &device).unwrap();
        let score = |apartment_type| {
            let categories = CategoricalInput {
                room_type: RoomType::Bedroom,
                apartment_type,
            };
            net.forward_one(&RasterImage::blank(), categories, vec![0.0, 0.5, 0.5], &device)
                .into_data()
                .to_vec::<f32>()
                .unwrap()
        };
        assert_eq!(score(ApartmentType::StudioBedroom), score(ApartmentType::FiveBedroom));
    }
}
