use std::io::Cursor;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use once_cell::sync::Lazy;

use crate::error::CubeErrorKind;
use crate::CubeResult;

/// Magic number expected at the beginning of a net file.
const NET_SIGNATURE: u32 = 0xFEFE_ABD0;

/// Input ranges below this are treated as constant inputs.
const MIN_INPUT_RANGE: f32 = 1e-6;

/// Tabulated sigmoid over [-10, 10] with step 0.01.
static SIGMOID_TABLE: Lazy<Vec<f32>> = Lazy::new(|| {
    (0..=2000)
        .map(|idx| {
            let x = idx as f32 * 0.01 - 10.0;
            1.0 / (1.0 + (-x).exp())
        })
        .collect()
});

#[inline]
fn sigmoid(activation: f32) -> f32 {
    if activation <= -10.0 {
        0.0
    } else if activation >= 10.0 {
        1.0
    } else {
        SIGMOID_TABLE[(100.0 * (activation + 10.0)) as usize]
    }
}

#[derive(Debug, Clone, Copy)]
struct WeightedInput {
    node: usize,
    weight: f32,
}

#[derive(Debug, Clone, Default)]
struct Node {
    bias: f32,
    inputs: Vec<WeightedInput>,
}

/// A read-only feed-forward network of sigmoid neurons, loaded from the
/// binary `.cube.nn` container. After loading, the input normalization
/// statistics are folded into the input biases and first-layer weights so a
/// feed-forward is a single pull-free pass in node order.
#[derive(Debug, Clone)]
pub struct NeuralNet {
    in_cnt: usize,
    out_cnt: usize,
    auto_encoder: bool,
    nodes: Vec<Node>,
}

impl NeuralNet {
    pub fn in_count(&self) -> usize {
        self.in_cnt
    }

    pub fn out_count(&self) -> usize {
        self.out_cnt
    }

    pub fn is_auto_encoder(&self) -> bool {
        self.auto_encoder
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> CubeResult<NeuralNet> {
        let data = std::fs::read(path.as_ref()).map_err(|err| {
            CubeErrorKind::Io
                .with_error(anyhow::anyhow!(err))
                .add_context(format!("failed to load {}", path.as_ref().display()))
        })?;
        Self::from_bytes(&data)
    }

    pub fn from_bytes(data: &[u8]) -> CubeResult<NeuralNet> {
        let mut rdr = Cursor::new(data);
        let decode_err =
            |err: std::io::Error| CubeErrorKind::Decode.with_error(anyhow::anyhow!(err));

        let signature = rdr.read_u32::<LittleEndian>().map_err(decode_err)?;
        if signature != NET_SIGNATURE {
            return Err(CubeErrorKind::Decode
                .with_error(anyhow::anyhow!("bad net signature: {:#x}", signature)));
        }
        let auto_encoder = rdr.read_u32::<LittleEndian>().map_err(decode_err)? != 0;
        let neuron_cnt = rdr.read_u32::<LittleEndian>().map_err(decode_err)? as usize;
        let in_cnt = rdr.read_u32::<LittleEndian>().map_err(decode_err)? as usize;
        let out_cnt = rdr.read_u32::<LittleEndian>().map_err(decode_err)? as usize;
        if neuron_cnt == 0 || in_cnt == 0 || out_cnt == 0 || in_cnt + out_cnt > neuron_cnt {
            return Err(CubeErrorKind::Decode.with_error(anyhow::anyhow!(
                "bad net geometry: {} neurons, {} in, {} out",
                neuron_cnt,
                in_cnt,
                out_cnt
            )));
        }

        // fan-out lists define, in creation order, each node's fan-in
        let mut fan_in: Vec<Vec<usize>> = vec![Vec::new(); neuron_cnt];
        for node_idx in 0..neuron_cnt {
            let fan_out_cnt = rdr.read_u32::<LittleEndian>().map_err(decode_err)? as usize;
            for _ in 0..fan_out_cnt {
                let to = rdr.read_u32::<LittleEndian>().map_err(decode_err)? as usize;
                if to >= neuron_cnt {
                    return Err(CubeErrorKind::Decode
                        .with_error(anyhow::anyhow!("connection target out of range: {}", to)));
                }
                // feedback connections are not allowed
                if to <= node_idx {
                    return Err(CubeErrorKind::Decode.with_error(anyhow::anyhow!(
                        "feedback connection {} -> {}",
                        node_idx,
                        to
                    )));
                }
                fan_in[to].push(node_idx);
            }
        }

        // per-neuron bias and fan-in weights
        let mut biases = vec![0f32; neuron_cnt];
        let mut weights: Vec<Vec<f32>> = vec![Vec::new(); neuron_cnt];
        for node_idx in 0..neuron_cnt {
            let bias = rdr.read_f32::<LittleEndian>().map_err(decode_err)?;
            // input nodes carry no bias of their own
            if node_idx >= in_cnt {
                biases[node_idx] = bias;
            }
            let fan_in_cnt = rdr.read_u32::<LittleEndian>().map_err(decode_err)? as usize;
            if fan_in_cnt != fan_in[node_idx].len() {
                return Err(CubeErrorKind::Decode.with_error(anyhow::anyhow!(
                    "fan-in count mismatch at node {}: {} != {}",
                    node_idx,
                    fan_in_cnt,
                    fan_in[node_idx].len()
                )));
            }
            for _ in 0..fan_in_cnt {
                weights[node_idx].push(rdr.read_f32::<LittleEndian>().map_err(decode_err)?);
            }
        }

        // input normalization statistics
        let mut read_stats = |cnt: usize| -> CubeResult<Vec<f32>> {
            (0..cnt)
                .map(|_| rdr.read_f32::<LittleEndian>().map_err(decode_err))
                .collect()
        };
        let inputs_mean = read_stats(in_cnt)?;
        let inputs_std_dev = read_stats(in_cnt)?;
        let inputs_min = read_stats(in_cnt)?;
        let inputs_max = read_stats(in_cnt)?;

        // fold normalization into the fast read-only form
        let mut nodes = Vec::with_capacity(neuron_cnt);
        for node_idx in 0..neuron_cnt {
            if node_idx < in_cnt {
                let range = inputs_max[node_idx] - inputs_min[node_idx];
                let bias = if range.abs() < MIN_INPUT_RANGE {
                    // constant input: its stdev is undefined
                    0.0
                } else {
                    inputs_min[node_idx] + inputs_mean[node_idx] * range
                };
                nodes.push(Node {
                    bias,
                    inputs: Vec::new(),
                });
            } else {
                let inputs = fan_in[node_idx]
                    .iter()
                    .zip(&weights[node_idx])
                    .map(|(&from, &weight)| {
                        let weight = if from < in_cnt {
                            let range = inputs_max[from] - inputs_min[from];
                            if range.abs() < MIN_INPUT_RANGE {
                                0.0
                            } else {
                                weight / (range * inputs_std_dev[from])
                            }
                        } else {
                            weight
                        };
                        WeightedInput { node: from, weight }
                    })
                    .collect();
                nodes.push(Node {
                    bias: biases[node_idx],
                    inputs,
                });
            }
        }

        Ok(NeuralNet {
            in_cnt,
            out_cnt,
            auto_encoder,
            nodes,
        })
    }

    /// Runs a feed-forward pass. `outputs` must hold `out_count` values.
    pub fn feed_forward(&self, inputs: &[f32], outputs: &mut [f32]) -> bool {
        if inputs.len() < self.in_cnt || outputs.len() < self.out_cnt {
            return false;
        }
        let mut outs = vec![0f32; self.nodes.len()];
        for (node_idx, node) in self.nodes.iter().enumerate() {
            if node_idx < self.in_cnt {
                outs[node_idx] = inputs[node_idx] - node.bias;
            } else {
                let mut activation = -node.bias;
                for input in &node.inputs {
                    activation += input.weight * outs[input.node];
                }
                outs[node_idx] = sigmoid(activation);
            }
        }
        let first_out = self.nodes.len() - self.out_cnt;
        outputs[..self.out_cnt].copy_from_slice(&outs[first_out..]);
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    /// Serializes a single-layer net: `in_cnt` inputs all feeding every
    /// output, identity normalization.
    pub(crate) fn encode_net(in_cnt: usize, out_cnt: usize, biases: &[f32], wgts: &[Vec<f32>]) -> Vec<u8> {
        let neuron_cnt = in_cnt + out_cnt;
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(NET_SIGNATURE).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap();
        buf.write_u32::<LittleEndian>(neuron_cnt as u32).unwrap();
        buf.write_u32::<LittleEndian>(in_cnt as u32).unwrap();
        buf.write_u32::<LittleEndian>(out_cnt as u32).unwrap();
        // fan-out lists
        for _ in 0..in_cnt {
            buf.write_u32::<LittleEndian>(out_cnt as u32).unwrap();
            for out in 0..out_cnt {
                buf.write_u32::<LittleEndian>((in_cnt + out) as u32).unwrap();
            }
        }
        for _ in 0..out_cnt {
            buf.write_u32::<LittleEndian>(0).unwrap();
        }
        // biases + fan-in weights
        for _ in 0..in_cnt {
            buf.write_f32::<LittleEndian>(0.0).unwrap();
            buf.write_u32::<LittleEndian>(0).unwrap();
        }
        for out in 0..out_cnt {
            buf.write_f32::<LittleEndian>(biases[out]).unwrap();
            buf.write_u32::<LittleEndian>(in_cnt as u32).unwrap();
            for input in 0..in_cnt {
                buf.write_f32::<LittleEndian>(wgts[out][input]).unwrap();
            }
        }
        // mean, stddev, min, max
        for _ in 0..in_cnt {
            buf.write_f32::<LittleEndian>(0.0).unwrap();
        }
        for _ in 0..in_cnt {
            buf.write_f32::<LittleEndian>(1.0).unwrap();
        }
        for _ in 0..in_cnt {
            buf.write_f32::<LittleEndian>(0.0).unwrap();
        }
        for _ in 0..in_cnt {
            buf.write_f32::<LittleEndian>(1.0).unwrap();
        }
        buf
    }

    #[test]
    fn test_feed_forward() {
        let data = encode_net(2, 1, &[0.5], &[vec![1.0, -2.0]]);
        let net = NeuralNet::from_bytes(&data).unwrap();
        assert_eq!(net.in_count(), 2);
        assert_eq!(net.out_count(), 1);

        let mut out = [0f32];
        assert!(net.feed_forward(&[1.0, 0.25], &mut out));
        // sigmoid(1.0*1.0 - 2.0*0.25 - 0.5) = sigmoid(0)
        assert!((out[0] - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_saturation() {
        let data = encode_net(1, 1, &[0.0], &[vec![100.0]]);
        let net = NeuralNet::from_bytes(&data).unwrap();
        let mut out = [0f32];
        net.feed_forward(&[1.0], &mut out);
        assert_eq!(out[0], 1.0);
        net.feed_forward(&[-1.0], &mut out);
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn test_rejects_bad_signature() {
        let mut data = encode_net(1, 1, &[0.0], &[vec![1.0]]);
        data[0] ^= 0xff;
        let err = NeuralNet::from_bytes(&data).unwrap_err();
        assert_eq!(err.kind(), CubeErrorKind::Decode);
    }

    #[test]
    fn test_rejects_truncated() {
        let data = encode_net(2, 1, &[0.5], &[vec![1.0, -2.0]]);
        let err = NeuralNet::from_bytes(&data[..data.len() - 6]).unwrap_err();
        assert_eq!(err.kind(), CubeErrorKind::Decode);
    }
}
