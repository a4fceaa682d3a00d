//! Example: Write a multi-array TAD file, then inspect it.
//!
//! Creates a temporary file holding an elevation grid and an RGB image,
//! reads the arrays back by index and prints their shapes and tags.

use tad_format::{Array, ElementType, TadStream};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("demo.tad");

    // A 2x2 elevation grid in meters
    let mut grid = Array::from_data([2, 2], 1, ElementType::Uint8, vec![10, 20, 30, 40])?;
    grid.global_tags_mut().set("UNIT", "meters")?;

    // A 64x48 RGB gradient
    let mut image = Array::new([64, 48], 3, ElementType::Uint8)?;
    for linear in 0..image.element_count() {
        let index = image.to_vector_index(linear).unwrap_or_default();
        if let Some(offset) = image.element_offset(linear) {
            let pixel = &mut image.data_mut()[offset..offset + 3];
            pixel[0] = (index[0] * 4) as u8;
            pixel[1] = (index[1] * 5) as u8;
            pixel[2] = 128;
        }
    }
    image.global_tags_mut().set("TITLE", "gradient")?;
    for (c, name) in ["RED", "GREEN", "BLUE"].iter().enumerate() {
        image
            .component_tags_mut(c)
            .set("INTERPRETATION", format!("SRGB/{name}"))?;
    }

    let mut out = TadStream::create(&path)?;
    out.write_array(&grid)?;
    out.write_array(&image)?;
    out.close()?;

    println!("=== TAD File Inspector ===\n");
    println!("File: {} ({} bytes)", path.display(), std::fs::metadata(&path)?.len());

    let mut input = TadStream::open(&path)?;
    let count = input.array_count()?.unwrap_or(0);
    println!("Arrays: {count}\n");

    // Newest first, to show random access
    for i in (0..count).rev() {
        let array = input.read_at(i)?;
        println!(
            "[{i}] {} x {}, dimensions {:?}, {} bytes",
            array.component_count(),
            array.element_type(),
            array.dimensions(),
            array.data_size()
        );
        for (key, value) in array.global_tags().iter() {
            println!("     {key}={value}");
        }
    }

    Ok(())
}
