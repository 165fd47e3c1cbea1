// Embeddings are stored as little-endian f32 BLOBs in both the entity table
// and the vector index.

/// Decode an embedding BLOB. Trailing bytes short of a full f32 are ignored.
pub fn bytes_to_f32_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Encode an embedding for a BLOB column.
pub fn f32_vec_to_bytes(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Similarity of a stored embedding to a query, accumulated in f64.
/// Mismatched lengths or a zero vector score 0.0 so the caller's dimension
/// check decides what to do with them.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f64, 0.0f64, 0.0f64), |acc, (&x, &y)| {
            let (x, y) = (x as f64, y as f64);
            (acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
        });
    let denom = (norm_a * norm_b).sqrt();
    if denom < 1e-12 {
        return 0.0;
    }
    dot / denom
}

/// Cosine distance in [0, 2]: 0 for identical direction, 1 for orthogonal.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    (1.0 - cosine_similarity(a, b)).clamp(0.0, 2.0) as f32
}
