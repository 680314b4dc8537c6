use std::io::Cursor;

use anyhow::ensure;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use ndarray::Array4;
use tract_onnx::pb::attribute_proto::AttributeType;
use tract_onnx::pb::tensor_proto::DataType;
use tract_onnx::pb::tensor_shape_proto::{dimension, Dimension};
use tract_onnx::pb::type_proto;
use tract_onnx::pb::{
    AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto, TensorProto,
    TensorShapeProto, TypeProto, ValueInfoProto,
};

use crate::inference::Classifier;

/// PNG-encoded RGB image where pixel (x, y) is `[x * 10, y * 20, 255]`.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let buffer = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 10) as u8, (y * 20) as u8, 255])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(buffer)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

/// Returns the same scores for every input.
pub struct FixedScores(pub Vec<f32>);

impl Classifier for FixedScores {
    fn forward(&self, _input: Array4<f32>) -> anyhow::Result<Vec<f32>> {
        Ok(self.0.clone())
    }
}

/// Rejects inputs of any other shape, like a model with a fixed input fact,
/// and otherwise derives softmax scores from the mean of each channel.
pub struct ShapeChecked {
    shape: [usize; 4],
}

impl ShapeChecked {
    pub fn new(shape: [usize; 4]) -> Self {
        ShapeChecked { shape }
    }
}

impl Classifier for ShapeChecked {
    fn forward(&self, input: Array4<f32>) -> anyhow::Result<Vec<f32>> {
        ensure!(
            input.shape() == self.shape,
            "expected input shape {:?}, got {:?}",
            self.shape,
            input.shape()
        );

        let pixels = (self.shape[1] * self.shape[2]) as f32;
        let mut logits: Vec<f32> = (0..self.shape[3])
            .map(|c| input.index_axis(ndarray::Axis(3), c).sum() / pixels / 255.0)
            .collect();
        logits.resize(5, 0.0);

        let total: f32 = logits.iter().map(|l| l.exp()).sum();
        Ok(logits.iter().map(|l| l.exp() / total).collect())
    }
}

fn float_value(name: &str, dims: &[i64]) -> ValueInfoProto {
    let shape = TensorShapeProto {
        dim: dims
            .iter()
            .map(|&d| Dimension {
                value: Some(dimension::Value::DimValue(d)),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };
    ValueInfoProto {
        name: name.to_string(),
        r#type: Some(TypeProto {
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type: DataType::Float as i32,
                shape: Some(shape),
                ..Default::default()
            })),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// ONNX graph taking `[1, height, width, 3]` pixels: the per-channel mean
/// goes through a `3 x outputs` matmul, giving `[1, outputs]` scores.
pub fn mean_pool_model(height: i64, width: i64, outputs: usize) -> ModelProto {
    let reduce = NodeProto {
        name: "pool".to_string(),
        op_type: "ReduceMean".to_string(),
        input: vec!["pixels".to_string()],
        output: vec!["pooled".to_string()],
        attribute: vec![
            AttributeProto {
                name: "axes".to_string(),
                r#type: AttributeType::Ints as i32,
                ints: vec![1, 2],
                ..Default::default()
            },
            AttributeProto {
                name: "keepdims".to_string(),
                r#type: AttributeType::Int as i32,
                i: 0,
                ..Default::default()
            },
        ],
        ..Default::default()
    };
    let matmul = NodeProto {
        name: "head".to_string(),
        op_type: "MatMul".to_string(),
        input: vec!["pooled".to_string(), "weights".to_string()],
        output: vec!["scores".to_string()],
        ..Default::default()
    };
    let weights = TensorProto {
        name: "weights".to_string(),
        dims: vec![3, outputs as i64],
        data_type: DataType::Float as i32,
        float_data: (0..3 * outputs).map(|i| (i % 7) as f32 / 100.0).collect(),
        ..Default::default()
    };

    ModelProto {
        ir_version: 7,
        opset_import: vec![OperatorSetIdProto {
            domain: String::new(),
            version: 13,
            ..Default::default()
        }],
        graph: Some(GraphProto {
            name: "mean_pool".to_string(),
            node: vec![reduce, matmul],
            initializer: vec![weights],
            input: vec![float_value("pixels", &[1, height, width, 3])],
            output: vec![float_value("scores", &[1, outputs as i64])],
            ..Default::default()
        }),
        ..Default::default()
    }
}
